use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::{App as ClapApp, Arg};
use log::info;

use plugin_workshop::api::{configure_routes, ApiState};
use plugin_workshop::persistence::{FileSystemStorage, StorageProvider};
use plugin_workshop::{
    PluginCatalog, RatingService, RatingStore, StatisticsAggregator, WorkshopConfig,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 配置命令行参数
    let matches = ClapApp::new("Workshop Rating Server")
        .version("1.0")
        .author("Workshop Team")
        .about("HTTP API for the plugin workshop rating system")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("Path to config.json")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port (overrides config)")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("data_dir")
                .short('d')
                .long("data-dir")
                .value_name("DATA_DIR")
                .help("Storage directory (overrides config)")
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    // 初始化日志
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // 加载配置，命令行参数优先
    let config_path = matches.value_of("config").unwrap_or("config.json");
    let mut config =
        WorkshopConfig::load_or_create(config_path).context("Failed to load configuration")?;

    if let Some(port) = matches.value_of("port") {
        config.server.port = port.parse().context("Invalid port argument")?;
    }
    if let Some(data_dir) = matches.value_of("data_dir") {
        config.storage.data_dir = data_dir.to_string();
    }

    // 组装评分引擎
    let storage: Arc<dyn StorageProvider> = Arc::new(
        FileSystemStorage::new(&config.storage.data_dir)
            .context("Failed to initialize storage")?,
    );
    let catalog = Arc::new(PluginCatalog::with_storage(storage.clone()));
    let restored_plugins = catalog
        .load_from_storage()
        .await
        .context("Failed to load plugin catalog")?;
    if restored_plugins == 0 {
        catalog
            .seed_builtin_plugins()
            .await
            .context("Failed to seed builtin plugins")?;
    }

    let store = Arc::new(RatingStore::new(catalog.clone(), storage.clone()));
    let loaded = store
        .load_from_storage()
        .await
        .context("Failed to load ratings")?;
    info!("Rating store ready, {} ratings restored", loaded);

    let aggregator = Arc::new(StatisticsAggregator::new(store.clone(), storage));
    aggregator
        .load_from_storage()
        .await
        .context("Failed to load statistics snapshots")?;

    let service = Arc::new(RatingService::new(catalog, store, aggregator));
    let state = ApiState {
        service,
        app: config.app.clone(),
    };

    let bind_addr = (config.server.host.clone(), config.server.port);
    info!(
        "Starting workshop rating server at http://{}:{}",
        bind_addr.0, bind_addr.1
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}

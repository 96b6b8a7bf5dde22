/// 一次提交的客户端来源信息，由传输层采集
#[derive(Debug, Clone, Default)]
pub struct IdentitySource {
    /// 直连对端地址（不含端口）
    pub peer_addr: Option<String>,
    /// X-Forwarded-For 头原始值
    pub forwarded_for: Option<String>,
    /// User-Agent 头原始值
    pub user_agent: Option<String>,
}

impl IdentitySource {
    /// 测试用：直接指定身份键的合成来源
    pub fn synthetic(identity: impl Into<String>) -> Self {
        Self {
            forwarded_for: Some(identity.into()),
            ..Default::default()
        }
    }
}

/// 将客户端来源解析为稳定的身份键
///
/// 纯函数，同一客户端重复调用产生同一个键。优先取 X-Forwarded-For
/// 的第一项（代理链中最接近客户端的地址），否则退回直连地址。
pub fn resolve_identity(source: &IdentitySource) -> String {
    if let Some(forwarded) = &source.forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(peer) = &source.peer_addr {
        if !peer.is_empty() {
            return peer.clone();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let source = IdentitySource {
            peer_addr: Some("10.0.0.1".to_string()),
            forwarded_for: Some("203.0.113.7, 10.0.0.2".to_string()),
            user_agent: None,
        };
        assert_eq!(resolve_identity(&source), "203.0.113.7");
    }

    #[test]
    fn test_peer_addr_fallback() {
        let source = IdentitySource {
            peer_addr: Some("192.168.1.20".to_string()),
            forwarded_for: None,
            user_agent: None,
        };
        assert_eq!(resolve_identity(&source), "192.168.1.20");
    }

    #[test]
    fn test_blank_forwarded_for_falls_through() {
        let source = IdentitySource {
            peer_addr: Some("192.168.1.20".to_string()),
            forwarded_for: Some("  ".to_string()),
            user_agent: None,
        };
        assert_eq!(resolve_identity(&source), "192.168.1.20");
    }

    #[test]
    fn test_stable_for_same_source() {
        let source = IdentitySource::synthetic("ip1");
        assert_eq!(resolve_identity(&source), resolve_identity(&source));
        assert_eq!(resolve_identity(&source), "ip1");
    }

    #[test]
    fn test_empty_source_is_unknown() {
        assert_eq!(resolve_identity(&IdentitySource::default()), "unknown");
    }
}

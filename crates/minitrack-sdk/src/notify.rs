//! 通知侧信道 - 宿主平台的弹窗/触觉反馈端口
//!
//! 尽力而为：核心逻辑不依赖通知成功，接口本身不可失败，
//! 宿主适配器自行吞掉底层错误。默认实现只打日志。

use std::fmt;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyKind::Success => "success",
            NotifyKind::Error => "error",
            NotifyKind::Warning => "warning",
            NotifyKind::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// 可注入的通知端口
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotifyKind);
}

/// 默认实现：只写日志，不触达宿主
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        tracing::debug!("notify [{}]: {}", kind, message);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// 测试用：收集所有通知
    #[derive(Debug, Default)]
    pub struct CollectingNotifier {
        pub messages: Mutex<Vec<(String, NotifyKind)>>,
    }

    impl Notifier for CollectingNotifier {
        fn notify(&self, message: &str, kind: NotifyKind) {
            self.messages.lock().push((message.to_string(), kind));
        }
    }
}

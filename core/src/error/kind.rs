use serde::{Deserialize, Serialize};

/// Numeric code printed next to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NotOnTargetPage = 10,
    WrongPageSection = 11,
    ContentNotFound = 20,
    AccessRestricted = 21,
    LinkInvalid = 22,
    CommunicationFailure = 30,
    Timeout = 31,
    Cancelled = 32,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// 提取失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 不在受支持的站点上
    NotOnTargetPage,
    /// 站点正确，但不在正确的子页面
    WrongPageSection,
    /// 页面已加载，但所有策略都未找到内容
    ContentNotFound,
    /// 需要密码或其他访问限制
    AccessRestricted,
    /// 链接失效或已过期
    LinkInvalid,
    /// 与注入上下文的消息通道无法建立
    CommunicationFailure,
    /// 超出墙钟时间预算
    Timeout,
    /// 用户主动取消
    Cancelled,
}

impl ErrorKind {
    /// Whether the caller should offer a retry (as opposed to a navigation hint).
    pub fn recoverable(self) -> bool {
        matches!(
            self,
            Self::ContentNotFound | Self::CommunicationFailure | Self::Timeout
        )
    }

    /// Failures that end a retry ladder on the attempt that observed them.
    pub fn short_circuits_retry(self) -> bool {
        matches!(
            self,
            Self::NotOnTargetPage
                | Self::WrongPageSection
                | Self::AccessRestricted
                | Self::LinkInvalid
                | Self::Cancelled
        )
    }

    pub fn error_code(self) -> ErrorCode {
        match self {
            Self::NotOnTargetPage => ErrorCode::NotOnTargetPage,
            Self::WrongPageSection => ErrorCode::WrongPageSection,
            Self::ContentNotFound => ErrorCode::ContentNotFound,
            Self::AccessRestricted => ErrorCode::AccessRestricted,
            Self::LinkInvalid => ErrorCode::LinkInvalid,
            Self::CommunicationFailure => ErrorCode::CommunicationFailure,
            Self::Timeout => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotOnTargetPage => "not_on_target_page",
            Self::WrongPageSection => "wrong_page_section",
            Self::ContentNotFound => "content_not_found",
            Self::AccessRestricted => "access_restricted",
            Self::LinkInvalid => "link_invalid",
            Self::CommunicationFailure => "communication_failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

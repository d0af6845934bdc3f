//! 에러 타입 정의
//!
//! 손상/중복/순서 뒤바뀜/누락 세그먼트는 에러가 아님 (프로토콜이 흡수, 통계로만 집계)
//! 여기 정의된 것은 드라이버가 선행 조건을 어긴 경우와 wire 디코딩 실패뿐

use thiserror::Error;

use crate::transport::Role;

/// 채널 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Receive => write!(f, "receive"),
        }
    }
}

/// RDT 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("잘못된 세그먼트 프레임: {len} bytes")]
    MalformedSegment { len: usize },

    #[error("{direction} 채널이 연결되지 않음")]
    ChannelNotWired { direction: Direction },

    #[error("송신 데이터가 이미 설정됨 (전송 중 교체 불가)")]
    PayloadAlreadySet,

    #[error("역할 불일치: {role:?} 역할은 {operation} 불가")]
    RoleMismatch { role: Role, operation: &'static str },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("태스크 에러: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

//! # RDT (Reliable Data Transfer)
//!
//! 신뢰할 수 없는 세그먼트 채널 위의 selective-repeat 슬라이딩 윈도우 ARQ
//!
//! ## 핵심 특징
//! - **tick 기반**: 타이머 없음, 매 time slice마다 송신 단계 → 수신 단계
//! - **선택적 ACK**: 빈틈이 있으면 누락 번호마다 ACK, 없으면 누적 ACK 하나
//! - **흐름 제어**: 미확인 세그먼트 수를 윈도우 크기 이하로 유지
//! - **체크섬**: 손상된 세그먼트는 조용히 버리고 재전송으로 복구
//! - **재조립**: 시퀀스 번호 슬롯에 기록, 순서 보장 prefix만 전달
//!
//! 채널 자체는 [`channel::Channel`] trait 뒤에 있으며 손실, 중복, 지연, 순서 뒤바뀜 가능

pub mod channel;
pub mod config;
pub mod error;
pub mod reassembly;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod sim;
pub mod stats;
pub mod transport;
pub mod window;

pub use channel::{Channel, ChannelConfig, ChannelStats, QueueChannel, SimulatedChannel};
pub use config::Config;
pub use error::{Direction, Error, Result};
pub use receiver::ReceiveState;
pub use segment::{Segment, SegmentBuilder, SegmentKind, SeqNum};
pub use sender::SendState;
pub use sim::{Simulation, SimulationReport};
pub use stats::TransferStats;
pub use transport::{RdtLayer, Role};

/// 미사용 시퀀스/ACK 필드 값
pub const SEQUENCE_SENTINEL: i32 = -1;

/// 기본 세그먼트 페이로드 길이 (바이트)
pub const DEFAULT_DATA_LENGTH: usize = 4;

/// 기본 흐름 제어 윈도우 (세그먼트)
pub const DEFAULT_WINDOW_SEGMENTS: usize = 3;

/// 기본 수신측 시퀀스 공간 상한
pub const DEFAULT_MAX_REASSEMBLY_SEGMENTS: u32 = 1_048_576;

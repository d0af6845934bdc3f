//! 프로토콜 설정

use crate::{
    error::{Error, Result},
    DEFAULT_DATA_LENGTH, DEFAULT_MAX_REASSEMBLY_SEGMENTS, DEFAULT_WINDOW_SEGMENTS,
};

/// RDT 전송 설정
///
/// 한 번의 전송 동안 고정됨 (양쪽 엔드포인트가 같은 값을 써야 함)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 세그먼트당 최대 페이로드 길이 (바이트)
    pub data_length: usize,

    /// 흐름 제어 윈도우 (동시에 in-flight 가능한 세그먼트 수)
    pub flow_control_window_segments: usize,

    /// 수신측 시퀀스 공간 상한
    /// 이 값 이상의 시퀀스 번호를 가진 데이터 세그먼트는 슬롯에 넣지 않고 버림
    pub max_reassembly_segments: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_length: DEFAULT_DATA_LENGTH,                         // 4 bytes
            flow_control_window_segments: DEFAULT_WINDOW_SEGMENTS,    // 3 세그먼트
            max_reassembly_segments: DEFAULT_MAX_REASSEMBLY_SEGMENTS, // 1M 세그먼트
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 바이트 단위 윈도우에서 세그먼트 단위 윈도우 계산
    ///
    /// 예: 15 bytes 윈도우 / 4 bytes 세그먼트 = 3 세그먼트
    pub fn from_window_bytes(data_length: usize, window_bytes: usize) -> Self {
        let flow_control_window_segments = if data_length == 0 {
            0
        } else {
            window_bytes / data_length
        };

        Self {
            data_length,
            flow_control_window_segments,
            ..Self::default()
        }
    }

    pub fn with_data_length(mut self, data_length: usize) -> Self {
        self.data_length = data_length;
        self
    }

    pub fn with_window_segments(mut self, window: usize) -> Self {
        self.flow_control_window_segments = window;
        self
    }

    pub fn with_max_reassembly_segments(mut self, max: u32) -> Self {
        self.max_reassembly_segments = max;
        self
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.data_length == 0 {
            return Err(Error::InvalidConfig("data_length must be > 0".into()));
        }
        if self.flow_control_window_segments == 0 {
            return Err(Error::InvalidConfig(
                "flow_control_window_segments must be > 0".into(),
            ));
        }
        if self.max_reassembly_segments == 0 {
            return Err(Error::InvalidConfig(
                "max_reassembly_segments must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// 페이로드 길이에 필요한 세그먼트 수 계산
    pub fn segments_for(&self, payload_len: usize) -> usize {
        if self.data_length == 0 {
            return 0;
        }
        (payload_len + self.data_length - 1) / self.data_length
    }

    /// 큰 세그먼트 + 넓은 윈도우 (손실 적은 채널용)
    pub fn bulk() -> Self {
        Self {
            data_length: 1024,
            flow_control_window_segments: 64,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_small_segments_small_window() {
        let config = Config::default();
        assert_eq!(config.data_length, 4);
        assert_eq!(config.flow_control_window_segments, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn window_from_bytes() {
        let config = Config::from_window_bytes(4, 15);
        assert_eq!(config.flow_control_window_segments, 3);

        let config = Config::from_window_bytes(4, 3);
        assert_eq!(config.flow_control_window_segments, 0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_data_length_rejected() {
        let config = Config::new().with_data_length(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert_eq!(config.segments_for(10), 0);
    }

    #[test]
    fn segments_for_rounds_up() {
        let config = Config::default();
        assert_eq!(config.segments_for(0), 0);
        assert_eq!(config.segments_for(4), 1);
        assert_eq!(config.segments_for(10), 3);
    }
}

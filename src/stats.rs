//! 전송 통계
//!
//! 인스턴스 단위로만 보관 (프로세스 전역 카운터 없음)

/// 엔드포인트별 전송 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// 진행한 tick 수
    pub iterations: u64,

    /// 전송한 데이터 세그먼트 수 (재전송 포함)
    pub segments_sent: u64,

    /// 재전송한 데이터 세그먼트 수 (세그먼트 타임아웃)
    pub retransmitted_segments: u64,

    /// 전송한 ACK 세그먼트 수
    pub acks_sent: u64,

    /// 누적 ACK 전송 수
    pub cumulative_acks_sent: u64,

    /// 선택적 ACK (누락 요청) 전송 수
    pub selective_acks_sent: u64,

    /// 수신한 유효 ACK 세그먼트 수
    pub acks_received: u64,

    /// 수신한 유효 데이터 세그먼트 수
    pub data_segments_received: u64,

    /// 이미 채워진 슬롯에 대한 중복 세그먼트 수
    pub duplicate_segments: u64,

    /// 체크섬 불일치로 버린 세그먼트 수
    pub corrupt_segments: u64,

    /// 데이터/ACK 어느 쪽도 아닌 세그먼트 수
    pub malformed_segments: u64,

    /// 시퀀스 공간 상한을 넘은 세그먼트 수
    pub out_of_range_segments: u64,

    /// DATA_LENGTH보다 긴 페이로드로 버린 세그먼트 수
    pub oversized_segments: u64,

    /// 역할에 맞지 않는 세그먼트 수 (송신측에 온 데이터, 수신측에 온 ACK)
    pub misrouted_segments: u64,

    /// 관측된 최대 outstanding 세그먼트 수
    pub peak_outstanding: usize,

    /// 애플리케이션에 전달된 순서 보장 바이트 수
    pub bytes_delivered: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// outstanding 최대값 갱신
    pub fn record_outstanding(&mut self, outstanding: usize) {
        self.peak_outstanding = self.peak_outstanding.max(outstanding);
    }

    /// 버린 세그먼트 총합
    pub fn discarded_segments(&self) -> u64 {
        self.corrupt_segments
            + self.malformed_segments
            + self.out_of_range_segments
            + self.oversized_segments
            + self.misrouted_segments
    }

    /// 재전송 비율
    pub fn retransmit_ratio(&self) -> f64 {
        if self.segments_sent == 0 {
            return 0.0;
        }
        self.retransmitted_segments as f64 / self.segments_sent as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Iterations: {} | Sent: {} (retransmit {}, {:.1}%) | Acks: {} sent / {} received | Received: {} (dup {}, corrupt {}) | Delivered: {} bytes | Peak window: {}",
            self.iterations,
            self.segments_sent,
            self.retransmitted_segments,
            self.retransmit_ratio() * 100.0,
            self.acks_sent,
            self.acks_received,
            self.data_segments_received,
            self.duplicate_segments,
            self.corrupt_segments,
            self.bytes_delivered,
            self.peak_outstanding,
        )
    }
}

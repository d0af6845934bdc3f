//! 수신 엔진
//!
//! - 채널에서 꺼낸 배치를 검증/분류 (데이터 vs ACK)
//! - 유효한 데이터 세그먼트를 시퀀스 번호 슬롯에 기록 (중복 무시)
//! - 빈틈 없으면 누적 ACK 하나, 빈틈 있으면 누락 번호마다 선택적 ACK
//! - 순서 보장 prefix만 애플리케이션에 전달
//!
//! 송신측 배치는 항상 윈도우 크기의 배수 위치에서 시작하므로
//! 가장 큰 수신 번호가 속한 배치의 끝(frontier)까지 비어 있는 슬롯도 누락으로 취급
//! (배치 꼬리가 통째로 손실되어도 한 번에 요청)
//! DATA_LENGTH보다 짧은 페이로드는 마지막 세그먼트라서 frontier를 그 다음 번호로 자름

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::reassembly::{InsertOutcome, ReassemblyBuffer};
use crate::segment::{Segment, SegmentKind, SeqNum};
use crate::stats::TransferStats;
use crate::Config;

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    /// 버퍼에 빈틈 있음
    Receiving,

    /// 빈틈 없음, prefix 전체 전달됨
    Complete,
}

/// 검증/분류된 수신 배치
#[derive(Debug, Default)]
pub struct Inbound {
    /// (시퀀스 번호, 페이로드)
    pub data: Vec<(SeqNum, Bytes)>,

    /// ACK 번호
    pub acks: Vec<SeqNum>,
}

impl Inbound {
    /// 체크섬 검증 후 분류
    ///
    /// 손상되었거나 형식이 잘못된 세그먼트, `data_length`를 넘는 페이로드는 조용히 버림 (통계만 기록)
    pub fn classify(batch: Vec<Segment>, data_length: usize, stats: &mut TransferStats) -> Self {
        let mut inbound = Inbound::default();

        for segment in batch {
            if !segment.verify() {
                warn!("체크섬 불일치, 세그먼트 폐기: {}", segment);
                stats.corrupt_segments += 1;
                continue;
            }

            match segment.kind() {
                SegmentKind::Data(_) if segment.payload.len() > data_length => {
                    warn!(
                        "페이로드 길이 초과 ({} > {}), 세그먼트 폐기: {}",
                        segment.payload.len(),
                        data_length,
                        segment
                    );
                    stats.oversized_segments += 1;
                }
                SegmentKind::Data(seq) => {
                    stats.data_segments_received += 1;
                    inbound.data.push((seq, segment.payload));
                }
                SegmentKind::Ack(ack) => {
                    stats.acks_received += 1;
                    inbound.acks.push(ack);
                }
                SegmentKind::Malformed => {
                    warn!("형식 오류 세그먼트 폐기: {}", segment);
                    stats.malformed_segments += 1;
                }
            }
        }

        inbound
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.acks.is_empty()
    }
}

/// 수신 엔진
#[derive(Debug)]
pub struct ReceiveEngine {
    /// 재조립 버퍼
    buffer: ReassemblyBuffer,

    /// 애플리케이션에 전달된 순서 보장 데이터
    delivered: Vec<u8>,

    /// 전달된 세그먼트 수
    delivered_segments: SeqNum,

    /// 흐름 제어 윈도우 크기 (송신측 배치 크기)
    window_segments: SeqNum,

    /// 세그먼트 페이로드 최대 길이
    data_length: usize,

    /// 짧은 페이로드로 확인된 마지막 세그먼트
    last_seq: Option<SeqNum>,

    /// 직전 tick에 빈틈이 있었는지
    had_gaps: bool,
}

impl ReceiveEngine {
    /// 새 수신 엔진 생성
    pub fn new(config: &Config) -> Self {
        Self {
            buffer: ReassemblyBuffer::new(config.max_reassembly_segments),
            delivered: Vec::new(),
            delivered_segments: 0,
            window_segments: SeqNum::try_from(config.flow_control_window_segments)
                .unwrap_or(SeqNum::MAX)
                .max(1),
            data_length: config.data_length,
            last_seq: None,
            had_gaps: false,
        }
    }

    /// 현재까지 조립된 순서 보장 데이터
    pub fn data_received(&self) -> &[u8] {
        &self.delivered
    }

    pub fn buffer(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    /// 현재 수신 상태
    pub fn state(&self) -> ReceiveState {
        if self.missing().is_empty() {
            ReceiveState::Complete
        } else {
            ReceiveState::Receiving
        }
    }

    /// 누락된 시퀀스 번호 목록 (배치 frontier까지)
    pub fn missing(&self) -> Vec<SeqNum> {
        self.buffer.missing_until(self.frontier())
    }

    /// 가장 큰 수신 번호가 속한 송신 배치의 끝
    pub fn frontier(&self) -> SeqNum {
        let Some(highest) = self.buffer.highest_seen() else {
            return 0;
        };

        let batch_end = (highest / self.window_segments + 1).saturating_mul(self.window_segments);
        match self.last_seq {
            Some(last) => batch_end.min(last.saturating_add(1)),
            None => batch_end,
        }
    }

    /// 수신 단계: 데이터 세그먼트 슬롯 기록 → prefix 전달 → ACK 전송
    pub fn process(
        &mut self,
        data: Vec<(SeqNum, Bytes)>,
        channel: &dyn Channel,
        stats: &mut TransferStats,
    ) {
        for (seq, payload) in data {
            let short = payload.len() < self.data_length;
            match self.buffer.insert(seq, payload) {
                InsertOutcome::Inserted => {
                    debug!("세그먼트 {} 슬롯 기록", seq);
                    if short {
                        self.last_seq = Some(seq);
                    }
                }
                InsertOutcome::Duplicate => {
                    stats.duplicate_segments += 1;
                }
                InsertOutcome::OutOfRange => {
                    warn!("시퀀스 공간 초과, 세그먼트 {} 폐기", seq);
                    stats.out_of_range_segments += 1;
                }
            }
        }

        self.deliver_prefix(stats);

        let missing = self.missing();
        if missing.is_empty() {
            self.send_cumulative_ack(channel, stats);
        } else {
            self.send_selective_acks(&missing, channel, stats);
        }
    }

    /// 새로 이어진 prefix를 전달 버퍼에 추가
    fn deliver_prefix(&mut self, stats: &mut TransferStats) {
        let contiguous = self.buffer.contiguous_count();
        if contiguous == self.delivered_segments {
            return;
        }

        let before = self.delivered.len();
        for payload in self.buffer.in_order_from(self.delivered_segments) {
            self.delivered.extend_from_slice(payload);
        }
        self.delivered_segments = contiguous;
        stats.bytes_delivered += (self.delivered.len() - before) as u64;

        debug!(
            "prefix 전달: {} 세그먼트, {} bytes",
            contiguous,
            self.delivered.len()
        );
    }

    /// 빈틈 없음: 누적 ACK (다음에 필요한 번호 = 연속 수신 수)
    fn send_cumulative_ack(&mut self, channel: &dyn Channel, stats: &mut TransferStats) {
        if self.had_gaps {
            info!("빈틈 해소: {} 세그먼트 연속 수신", self.delivered_segments);
            self.had_gaps = false;
        }

        let segment = Segment::ack(self.delivered_segments);
        debug!("누적 ACK 전송: {}", segment);
        channel.send(segment);
        stats.acks_sent += 1;
        stats.cumulative_acks_sent += 1;
    }

    /// 빈틈 있음: 누락 번호마다 선택적 ACK
    fn send_selective_acks(
        &mut self,
        missing: &[SeqNum],
        channel: &dyn Channel,
        stats: &mut TransferStats,
    ) {
        self.had_gaps = true;

        for &seq in missing {
            let segment = Segment::ack(seq);
            debug!("선택적 ACK 전송: {}", segment);
            channel.send(segment);
            stats.acks_sent += 1;
            stats.selective_acks_sent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::QueueChannel;
    use crate::segment::checksum;

    fn data(seq: SeqNum, payload: &'static str) -> (SeqNum, Bytes) {
        (seq, Bytes::from_static(payload.as_bytes()))
    }

    fn acks(channel: &QueueChannel) -> Vec<SeqNum> {
        channel
            .receive()
            .iter()
            .map(|s| match s.kind() {
                SegmentKind::Ack(ack) => ack,
                other => panic!("unexpected segment {:?}", other),
            })
            .collect()
    }

    #[test]
    fn classify_partitions_and_drops_corrupt() {
        let mut stats = TransferStats::new();
        let mut corrupt = Segment::data(2, Bytes::from_static(b"IJ"));
        corrupt.payload = Bytes::from_static(b"XJ");
        let mut malformed = Segment::ack(1);
        malformed.header.seq_num = 4;
        malformed.header.checksum = checksum(4, 1, &[]);

        let inbound = Inbound::classify(
            vec![
                Segment::data(0, Bytes::from_static(b"ABCD")),
                Segment::ack(3),
                corrupt,
                malformed,
            ],
            4,
            &mut stats,
        );

        assert_eq!(inbound.data, vec![data(0, "ABCD")]);
        assert_eq!(inbound.acks, vec![3]);
        assert_eq!(stats.corrupt_segments, 1);
        assert_eq!(stats.malformed_segments, 1);
        assert_eq!(stats.data_segments_received, 1);
        assert_eq!(stats.acks_received, 1);
    }

    #[test]
    fn classify_drops_oversized_payload() {
        let mut stats = TransferStats::new();
        let inbound = Inbound::classify(
            vec![
                Segment::data(0, Bytes::from_static(b"ABCDE")),
                Segment::data(1, Bytes::from_static(b"EFGH")),
            ],
            4,
            &mut stats,
        );

        assert_eq!(inbound.data, vec![data(1, "EFGH")]);
        assert_eq!(stats.oversized_segments, 1);
        assert_eq!(stats.data_segments_received, 1);
        assert_eq!(stats.discarded_segments(), 1);
    }

    #[test]
    fn nothing_received_sends_cumulative_zero() {
        let mut engine = ReceiveEngine::new(&Config::default());
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        engine.process(Vec::new(), &channel, &mut stats);
        assert_eq!(acks(&channel), vec![0]);
        assert_eq!(engine.state(), ReceiveState::Complete);
        assert!(engine.data_received().is_empty());
    }

    #[test]
    fn gap_yields_selective_acks_and_prefix() {
        let mut engine = ReceiveEngine::new(&Config::default());
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        engine.process(vec![data(2, "IJ"), data(0, "ABCD")], &channel, &mut stats);
        assert_eq!(acks(&channel), vec![1]);
        assert_eq!(engine.data_received(), b"ABCD");
        assert_eq!(engine.state(), ReceiveState::Receiving);
        assert_eq!(stats.selective_acks_sent, 1);

        engine.process(vec![data(1, "EFGH")], &channel, &mut stats);
        assert_eq!(acks(&channel), vec![3]);
        assert_eq!(engine.data_received(), b"ABCDEFGHIJ");
        assert_eq!(engine.state(), ReceiveState::Complete);
        assert_eq!(stats.bytes_delivered, 10);
    }

    #[test]
    fn one_ack_per_missing_index() {
        let mut engine = ReceiveEngine::new(&Config::default());
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        engine.process(vec![data(4, "E")], &channel, &mut stats);
        assert_eq!(acks(&channel), vec![0, 1, 2, 3]);
        assert!(engine.data_received().is_empty());
    }

    #[test]
    fn lost_batch_tail_is_requested_at_once() {
        let config = Config::default().with_data_length(1).with_window_segments(8);
        let mut engine = ReceiveEngine::new(&config);
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        engine.process(vec![data(0, "A")], &channel, &mut stats);
        assert_eq!(acks(&channel), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(engine.state(), ReceiveState::Receiving);
        assert_eq!(stats.selective_acks_sent, 7);

        engine.process(
            (1..8).map(|seq| (seq, Bytes::from(vec![b'A' + seq as u8]))).collect(),
            &channel,
            &mut stats,
        );
        assert_eq!(acks(&channel), vec![8]);
        assert_eq!(engine.data_received(), b"ABCDEFGH");
        assert_eq!(engine.state(), ReceiveState::Complete);
    }

    #[test]
    fn short_payload_caps_frontier() {
        let config = Config::default().with_window_segments(8);
        let mut engine = ReceiveEngine::new(&config);
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        // 8 윈도우의 첫 배치지만 "IJ"가 마지막 세그먼트
        engine.process(vec![data(0, "ABCD"), data(2, "IJ")], &channel, &mut stats);
        assert_eq!(engine.frontier(), 3);
        assert_eq!(acks(&channel), vec![1]);

        engine.process(vec![data(1, "EFGH")], &channel, &mut stats);
        assert_eq!(acks(&channel), vec![3]);
        assert_eq!(engine.state(), ReceiveState::Complete);
    }

    #[test]
    fn frontier_follows_batch_boundaries() {
        let mut engine = ReceiveEngine::new(&Config::default());
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();
        assert_eq!(engine.frontier(), 0);

        engine.process(
            vec![data(0, "ABCD"), data(1, "EFGH"), data(2, "IJKL"), data(3, "MNOP")],
            &channel,
            &mut stats,
        );
        assert_eq!(engine.frontier(), 6);
        assert_eq!(acks(&channel), vec![4, 5]);
    }

    #[test]
    fn duplicates_are_idempotent() {
        let mut once = ReceiveEngine::new(&Config::default());
        let mut many = ReceiveEngine::new(&Config::default());
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        once.process(vec![data(0, "ABCD")], &channel, &mut stats);
        many.process(
            vec![data(0, "ABCD"), data(0, "ABCD"), data(0, "ABCD")],
            &channel,
            &mut stats,
        );
        many.process(vec![data(0, "ABCD")], &channel, &mut stats);

        assert_eq!(once.data_received(), many.data_received());
        assert_eq!(once.missing(), many.missing());
        assert_eq!(stats.duplicate_segments, 3);
    }

    #[test]
    fn out_of_range_segment_is_dropped() {
        let config = Config::default().with_max_reassembly_segments(2);
        let mut engine = ReceiveEngine::new(&config);
        let channel = QueueChannel::new();
        let mut stats = TransferStats::new();

        engine.process(vec![data(5, "Z")], &channel, &mut stats);
        assert_eq!(stats.out_of_range_segments, 1);
        assert_eq!(acks(&channel), vec![0]);
    }
}

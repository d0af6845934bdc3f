//! 송신 엔진
//!
//! - 첫 tick: 윈도우 크기만큼 새 세그먼트 전송
//! - 이후: 상대가 보낸 ACK 배치에 따라 누락분만 재전송하거나 윈도우를 밀고 다음 배치 전송
//! - 독립 타이머 없음, 재전송은 오직 ACK 피드백으로만 발생
//!
//! ACK 번호는 항상 "수신측이 아직 필요로 하는 시퀀스 번호"
//! 누적 ACK N (빈틈 없음, N이 다음) 과 선택적 ACK k (k 누락) 는 같은 요청으로 취급

use std::collections::BTreeSet;

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::segment::{Segment, SegmentBuilder, SeqNum};
use crate::stats::TransferStats;
use crate::window::SendWindow;
use crate::Config;

/// 송신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// 보낼 데이터 없음 또는 첫 tick 전
    Idle,

    /// 윈도우 여유 있음
    Sending,

    /// 윈도우 가득 참, ACK 대기 (선택적 ACK 오면 재전송)
    AwaitingAck,

    /// 모두 전송 + 모두 확인됨
    Drained,
}

/// 한 tick 동안 받은 ACK 배치 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// 피드백 없음 또는 무시할 ACK뿐
    None,

    /// 전송 위치까지 모두 수신됨, 윈도우 전진
    Proceed,

    /// 해당 시퀀스 번호 재전송 요청 (오름차순, 중복 없음)
    Retransmit(Vec<SeqNum>),
}

impl Feedback {
    /// ACK 배치 분류
    ///
    /// - 전송 위치(`next_seq_to_send`)와 같은 ACK가 하나라도 있으면 `Proceed`
    /// - 아니면 전송 위치 미만이면서 아직 outstanding인 번호 전부 재전송
    /// - 전송 위치를 넘는 ACK는 무시
    ///
    /// 송신 완료 후에는 전송 위치 미만의 요청을 outstanding 여부와 상관없이 재전송
    /// (마지막 배치가 짧으면 수신측이 전송 위치와 같은 번호를 빈 슬롯으로 요청할 수 있음)
    pub fn classify(window: &SendWindow, acks: &[SeqNum]) -> Self {
        let sent_position = window.next_seq_to_send();
        let drained = window.is_drained();

        if !drained && acks.contains(&sent_position) {
            return Feedback::Proceed;
        }

        let requested: BTreeSet<SeqNum> = acks
            .iter()
            .copied()
            .filter(|&ack| ack < sent_position && (drained || window.is_outstanding(ack)))
            .collect();

        if requested.is_empty() {
            Feedback::None
        } else {
            Feedback::Retransmit(requested.into_iter().collect())
        }
    }
}

/// 송신 엔진
#[derive(Debug)]
pub struct SendEngine {
    /// 세그먼트 빌더
    builder: SegmentBuilder,

    /// 흐름 제어 윈도우 크기
    window_segments: usize,

    /// DATA_LENGTH 단위로 분할된 페이로드
    payloads: Vec<Bytes>,

    /// 윈도우 상태 (데이터 설정 전에는 None)
    window: Option<SendWindow>,

    /// 첫 배치 전송 여부
    started: bool,
}

impl SendEngine {
    /// 새 송신 엔진 생성
    pub fn new(config: &Config) -> Self {
        Self {
            builder: SegmentBuilder::new(config.data_length),
            window_segments: config.flow_control_window_segments,
            payloads: Vec::new(),
            window: None,
            started: false,
        }
    }

    /// 송신 데이터 설정
    ///
    /// 분할된 세그먼트 수 반환, 두 번째 호출은 에러
    pub fn load(&mut self, data: Bytes) -> Result<usize> {
        if self.window.is_some() {
            return Err(Error::PayloadAlreadySet);
        }

        let payloads = self.builder.split_payload(&data);
        let total = SeqNum::try_from(payloads.len())
            .ok()
            .filter(|&total| total <= i32::MAX as SeqNum)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "payload of {} bytes exceeds the sequence space",
                    data.len()
                ))
            })?;

        debug!("송신 데이터 설정: {} bytes, {} 세그먼트", data.len(), total);

        self.payloads = payloads;
        self.window = Some(SendWindow::new(self.window_segments, total));
        Ok(total as usize)
    }

    pub fn has_data(&self) -> bool {
        self.window.is_some()
    }

    pub fn window(&self) -> Option<&SendWindow> {
        self.window.as_ref()
    }

    /// 현재 송신 상태
    pub fn state(&self) -> SendState {
        match &self.window {
            None => SendState::Idle,
            Some(_) if !self.started => SendState::Idle,
            Some(window) if window.is_drained() => SendState::Drained,
            Some(window) if window.can_send_more() => SendState::Sending,
            Some(_) => SendState::AwaitingAck,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.state() == SendState::Drained
    }

    /// 송신 단계 (tick마다 호출)
    ///
    /// 첫 tick에만 윈도우를 채움, 이후 전송은 `on_feedback`이 결정
    pub fn on_tick(&mut self, channel: &dyn Channel, stats: &mut TransferStats) {
        if self.started || self.window.is_none() {
            return;
        }
        self.started = true;

        let sent = self.flush(channel, stats);
        if sent == 0 {
            info!("전송할 세그먼트 없음, 송신 완료");
        }
    }

    /// 상대의 ACK 배치 처리
    pub fn on_feedback(
        &mut self,
        acks: &[SeqNum],
        channel: &dyn Channel,
        stats: &mut TransferStats,
    ) {
        if !self.started || acks.is_empty() {
            return;
        }
        let Some(window) = self.window.as_mut() else {
            return;
        };

        match Feedback::classify(window, acks) {
            Feedback::None => {
                trace!("유효한 피드백 없음: {:?}", acks);
                return;
            }

            Feedback::Proceed => {
                let sent_position = window.next_seq_to_send();
                let acked = window.mark_acked_below(sent_position);
                debug!("누적 ACK {}: {} 세그먼트 확인", sent_position, acked);

                if window.is_drained() {
                    info!(
                        "모든 세그먼트 확인됨 ({} 세그먼트), 송신 완료",
                        window.total_segments()
                    );
                }
            }

            Feedback::Retransmit(missing) => {
                if window.is_drained() {
                    debug!("송신 완료 후 재전송 요청: {:?}", missing);
                } else {
                    debug!("재전송 요청: {:?}", missing);
                }
                for seq in missing {
                    window.request_retransmit(seq);
                }
            }
        }

        self.flush(channel, stats);
    }

    /// 재전송 요청분을 먼저, 그다음 윈도우 여유만큼 새 세그먼트 전송
    fn flush(&mut self, channel: &dyn Channel, stats: &mut TransferStats) -> usize {
        let mut sent = 0;

        loop {
            let Some(window) = self.window.as_mut() else {
                break;
            };
            let Some(seq) = window.next_missing_or_next_new() else {
                break;
            };

            if window.clear_retransmit(seq) {
                stats.retransmitted_segments += 1;
            } else if !window.mark_sent(seq) {
                break;
            }

            self.transmit(seq, channel, stats);
            sent += 1;
        }

        if let Some(window) = &self.window {
            stats.record_outstanding(window.outstanding_count());
        }
        sent
    }

    /// 세그먼트 한 개 전송 (매번 새로 포장)
    fn transmit(&self, seq: SeqNum, channel: &dyn Channel, stats: &mut TransferStats) {
        let Some(payload) = self.payloads.get(seq as usize) else {
            return;
        };

        let segment = Segment::data(seq, payload.clone());
        debug!("세그먼트 전송: {}", segment);
        channel.send(segment);
        stats.segments_sent += 1;
    }
}

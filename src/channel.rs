//! 세그먼트 채널
//!
//! 코어는 `send(segment)` / `receive() -> Vec<Segment>` 두 연산만 사용
//! 전달 보장은 채널 구현의 몫 (손실, 중복, 지연, 순서 뒤바뀜 가능)
//!
//! - [`QueueChannel`]: 손실 없는 FIFO (crossbeam-channel)
//! - [`SimulatedChannel`]: 장애 주입 채널 (손실/중복/지연/순서/비트 손상), seed 고정 RNG
//!
//! 메서드는 `&self`를 받으므로 스레드 간 공유 시 동기화는 구현체 내부에서 처리

use std::sync::Arc;

use crossbeam_channel::{Receiver as CbReceiver, Sender as CbSender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::segment::Segment;

/// 단방향 세그먼트 채널
pub trait Channel: Send + Sync {
    /// 세그먼트 하나를 상대에게 전송 (전달 보장 없음)
    fn send(&self, segment: Segment);

    /// 현재 도착해 있는 세그먼트를 모두 꺼냄 (없으면 빈 Vec)
    fn receive(&self) -> Vec<Segment>;
}

/// 손실 없는 FIFO 채널
pub struct QueueChannel {
    tx: CbSender<Segment>,
    rx: CbReceiver<Segment>,
}

impl QueueChannel {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// 대기 중인 세그먼트 수
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for QueueChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for QueueChannel {
    fn send(&self, segment: Segment) {
        // rx를 직접 보유하므로 unbounded 송신은 실패하지 않음
        let _ = self.tx.send(segment);
    }

    fn receive(&self) -> Vec<Segment> {
        self.rx.try_iter().collect()
    }
}

/// 장애 주입 모델 설정
///
/// 확률은 모두 `[0.0, 1.0]` (범위 밖 값은 잘라냄)
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// 세그먼트 손실 확률
    pub drop_rate: f64,

    /// 세그먼트 중복 확률
    pub duplicate_rate: f64,

    /// 세그먼트 지연 확률
    pub delay_rate: f64,

    /// 최대 지연 (receive 호출 횟수)
    pub max_delay: u32,

    /// 매 receive 배치 순서 섞기
    pub reorder: bool,

    /// 비트 손상 확률
    pub corrupt_rate: f64,

    /// RNG seed
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

impl ChannelConfig {
    /// 장애 없음
    pub fn reliable() -> Self {
        Self {
            drop_rate: 0.0,
            duplicate_rate: 0.0,
            delay_rate: 0.0,
            max_delay: 0,
            reorder: false,
            corrupt_rate: 0.0,
            seed: 0,
        }
    }

    /// 손실 + 순서 뒤바뀜
    pub fn lossy() -> Self {
        Self {
            drop_rate: 0.1,
            reorder: true,
            ..Self::reliable()
        }
    }

    /// 모든 장애 활성화
    pub fn hostile() -> Self {
        Self {
            drop_rate: 0.1,
            duplicate_rate: 0.1,
            delay_rate: 0.1,
            max_delay: 3,
            reorder: true,
            corrupt_rate: 0.05,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn clamped(mut self) -> Self {
        self.drop_rate = probability(self.drop_rate);
        self.duplicate_rate = probability(self.duplicate_rate);
        self.delay_rate = probability(self.delay_rate);
        self.corrupt_rate = probability(self.corrupt_rate);
        self
    }
}

/// [0, 1]로 제한, NaN/무한대는 장애 없음(0.0)
fn probability(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// 채널 장애 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub sent: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub delayed: u64,
    pub corrupted: u64,
    pub delivered: u64,
}

/// 전송 중인 세그먼트
struct InFlight {
    segment: Segment,
    /// 남은 지연 (receive 호출 횟수)
    remaining: u32,
}

struct SimInner {
    queue: Vec<InFlight>,
    rng: StdRng,
    stats: ChannelStats,
}

/// 장애 주입 채널
pub struct SimulatedChannel {
    config: ChannelConfig,
    inner: Mutex<SimInner>,
}

impl SimulatedChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let config = config.clamped();
        Self {
            inner: Mutex::new(SimInner {
                queue: Vec::new(),
                rng: StdRng::seed_from_u64(config.seed),
                stats: ChannelStats::default(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stats(&self) -> ChannelStats {
        self.inner.lock().stats.clone()
    }

    /// 아직 전달되지 않은 세그먼트 수
    pub fn in_flight(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

/// 직렬화된 프레임의 임의 비트를 뒤집고 다시 해석
///
/// 디코딩이 안 되면 `None` (프레임 손실)
fn corrupt(segment: &Segment, rng: &mut StdRng) -> Option<Segment> {
    let mut frame = segment.to_bytes().ok()?;
    if frame.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..frame.len());
    frame[index] ^= 1 << rng.gen_range(0..8);
    Segment::from_bytes(&frame).ok()
}

impl Channel for SimulatedChannel {
    fn send(&self, segment: Segment) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.stats.sent += 1;

        if inner.rng.gen_bool(self.config.drop_rate) {
            inner.stats.dropped += 1;
            trace!("channel drop: {}", segment);
            return;
        }

        let copies = if inner.rng.gen_bool(self.config.duplicate_rate) {
            inner.stats.duplicated += 1;
            2
        } else {
            1
        };

        for _ in 0..copies {
            let segment = if inner.rng.gen_bool(self.config.corrupt_rate) {
                inner.stats.corrupted += 1;
                match corrupt(&segment, &mut inner.rng) {
                    Some(corrupted) => corrupted,
                    None => continue,
                }
            } else {
                segment.clone()
            };

            let remaining = if self.config.max_delay > 0
                && inner.rng.gen_bool(self.config.delay_rate)
            {
                inner.stats.delayed += 1;
                inner.rng.gen_range(1..=self.config.max_delay)
            } else {
                0
            };

            inner.queue.push(InFlight { segment, remaining });
        }
    }

    fn receive(&self) -> Vec<Segment> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut ready = Vec::new();
        let mut pending = Vec::with_capacity(inner.queue.len());

        for mut item in inner.queue.drain(..) {
            if item.remaining == 0 {
                ready.push(item.segment);
            } else {
                item.remaining -= 1;
                pending.push(item);
            }
        }
        inner.queue = pending;

        if self.config.reorder {
            ready.shuffle(&mut inner.rng);
        }

        inner.stats.delivered += ready.len() as u64;
        ready
    }
}

/// 두 엔드포인트를 잇는 장애 주입 채널 한 쌍 (송신측 → 수신측, 수신측 → 송신측)
///
/// 역방향 채널은 seed + 1을 사용 (두 방향의 장애 패턴이 같지 않도록)
pub fn pair(config: ChannelConfig) -> (Arc<SimulatedChannel>, Arc<SimulatedChannel>) {
    let reverse = config.clone().with_seed(config.seed.wrapping_add(1));
    (
        Arc::new(SimulatedChannel::new(config)),
        Arc::new(SimulatedChannel::new(reverse)),
    )
}

/// 손실 없는 FIFO 채널 한 쌍
pub fn queue_pair() -> (Arc<QueueChannel>, Arc<QueueChannel>) {
    (Arc::new(QueueChannel::new()), Arc::new(QueueChannel::new()))
}

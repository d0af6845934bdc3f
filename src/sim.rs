//! 시뮬레이션 드라이버
//!
//! 송신 역할 하나, 수신 역할 하나, 채널 두 개를 묶어 tick을 번갈아 실행
//! 수신측 조립 결과가 원본과 같고 송신측이 완료되면 종료

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::channel::{self, Channel, ChannelConfig};
use crate::error::Result;
use crate::stats::TransferStats;
use crate::transport::RdtLayer;
use crate::Config;

/// 기본 반복 상한
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

/// 시뮬레이션 결과
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// 실행한 반복 수
    pub iterations: u64,

    /// 전송 완료 여부 (수신 데이터 == 원본, 송신측 완료)
    pub completed: bool,

    /// 수신측이 조립한 데이터
    pub received: Vec<u8>,

    pub sender_stats: TransferStats,
    pub receiver_stats: TransferStats,
}

impl SimulationReport {
    /// 결과 요약 (로그용)
    pub fn summary(&self) -> String {
        format!(
            "iterations={} completed={} received={} bytes | sender: {} | receiver: {}",
            self.iterations,
            self.completed,
            self.received.len(),
            self.sender_stats.summary(),
            self.receiver_stats.summary()
        )
    }
}

/// 단일 스레드 시뮬레이션
pub struct Simulation {
    sender: RdtLayer,
    receiver: RdtLayer,
    payload: Bytes,
    max_iterations: u64,
    iterations: u64,
}

impl Simulation {
    /// 주어진 채널로 두 엔드포인트 연결
    ///
    /// `to_receiver`: 송신측 → 수신측, `to_sender`: 수신측 → 송신측
    pub fn new(
        config: Config,
        payload: impl Into<Bytes>,
        to_receiver: Arc<dyn Channel>,
        to_sender: Arc<dyn Channel>,
    ) -> Result<Self> {
        let payload = payload.into();

        let mut sender = RdtLayer::sender(config.clone())?;
        sender.set_send_channel(to_receiver.clone());
        sender.set_receive_channel(to_sender.clone());
        sender.set_data_to_send(payload.clone())?;

        let mut receiver = RdtLayer::receiver(config)?;
        receiver.set_send_channel(to_sender);
        receiver.set_receive_channel(to_receiver);

        Ok(Self {
            sender,
            receiver,
            payload,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            iterations: 0,
        })
    }

    /// 장애 주입 채널 한 쌍으로 연결
    pub fn simulated(
        config: Config,
        payload: impl Into<Bytes>,
        channel_config: ChannelConfig,
    ) -> Result<Self> {
        let (to_receiver, to_sender) = channel::pair(channel_config);
        Self::new(config, payload, to_receiver, to_sender)
    }

    /// 손실 없는 채널 한 쌍으로 연결
    pub fn reliable(config: Config, payload: impl Into<Bytes>) -> Result<Self> {
        let (to_receiver, to_sender) = channel::queue_pair();
        Self::new(config, payload, to_receiver, to_sender)
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// 한 반복: 송신측 tick → 수신측 tick
    pub fn step(&mut self) -> Result<()> {
        self.iterations += 1;
        self.sender.tick()?;
        self.receiver.tick()?;
        Ok(())
    }

    /// 전송 완료 여부
    pub fn is_complete(&self) -> bool {
        self.sender.is_drained() && self.receiver.data_received() == &self.payload[..]
    }

    /// 완료 또는 반복 상한까지 실행
    pub fn run(&mut self) -> Result<SimulationReport> {
        while !self.is_complete() && self.iterations < self.max_iterations {
            self.step()?;
        }

        let report = self.report();
        if report.completed {
            info!(
                "전송 완료: {} bytes, {} 반복",
                report.received.len(),
                report.iterations
            );
        } else {
            warn!(
                "반복 상한 도달: {}/{} bytes 수신",
                report.received.len(),
                self.payload.len()
            );
        }
        Ok(report)
    }

    /// 현재 상태 스냅샷
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            iterations: self.iterations,
            completed: self.is_complete(),
            received: self.receiver.data_received().to_vec(),
            sender_stats: self.sender.stats().clone(),
            receiver_stats: self.receiver.stats().clone(),
        }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn sender(&self) -> &RdtLayer {
        &self.sender
    }

    pub fn receiver(&self) -> &RdtLayer {
        &self.receiver
    }
}

/// 역할별 tokio 태스크로 실행
///
/// 두 태스크는 채널로만 통신하며 각자 tick을 돌림
/// 송신측은 송신 완료 후에도 수신측 조립이 끝날 때까지 늦은 재전송 요청에 응답
/// 수신측은 송신측 종료까지 ACK를 계속 보냄
pub async fn run_threaded(
    config: Config,
    payload: impl Into<Bytes>,
    channel_config: ChannelConfig,
    max_iterations: u64,
) -> Result<SimulationReport> {
    let payload = payload.into();
    let (to_receiver, to_sender) = channel::pair(channel_config);

    let mut sender = RdtLayer::sender(config.clone())?;
    sender.set_send_channel(to_receiver.clone());
    sender.set_receive_channel(to_sender.clone());
    sender.set_data_to_send(payload.clone())?;

    let mut receiver = RdtLayer::receiver(config)?;
    receiver.set_send_channel(to_sender);
    receiver.set_receive_channel(to_receiver);

    let sender_done = Arc::new(AtomicBool::new(false));
    let receiver_done = Arc::new(AtomicBool::new(false));

    let done = sender_done.clone();
    let assembled = receiver_done.clone();
    let sender_task = tokio::spawn(async move {
        let result = drive_sender(&mut sender, &assembled, max_iterations).await;
        done.store(true, Ordering::Release);
        result.map(|_| sender)
    });

    let expected = payload.clone();
    let done = sender_done.clone();
    let assembled = receiver_done.clone();
    let receiver_task = tokio::spawn(async move {
        while receiver.current_iteration() < max_iterations {
            if receiver.data_received() == &expected[..] {
                assembled.store(true, Ordering::Release);
                if done.load(Ordering::Acquire) {
                    break;
                }
            }
            receiver.tick()?;
            tokio::task::yield_now().await;
        }
        assembled.store(true, Ordering::Release);
        Ok::<_, crate::Error>(receiver)
    });

    let sender = sender_task.await??;
    let receiver = receiver_task.await??;

    let iterations = sender.current_iteration().max(receiver.current_iteration());
    let completed = sender.is_drained() && receiver.data_received() == &payload[..];
    debug!(
        "threaded 실행 종료: sender {} tick, receiver {} tick",
        sender.current_iteration(),
        receiver.current_iteration()
    );

    Ok(SimulationReport {
        iterations,
        completed,
        received: receiver.data_received().to_vec(),
        sender_stats: sender.stats().clone(),
        receiver_stats: receiver.stats().clone(),
    })
}

async fn drive_sender(
    sender: &mut RdtLayer,
    receiver_done: &AtomicBool,
    max_iterations: u64,
) -> Result<()> {
    while sender.current_iteration() < max_iterations {
        if sender.is_drained() && receiver_done.load(Ordering::Acquire) {
            break;
        }
        sender.tick()?;
        tokio::task::yield_now().await;
    }
    Ok(())
}

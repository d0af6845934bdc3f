//! RDT 계층 (드라이버가 사용하는 facade)
//!
//! tick마다 송신 엔진 → 수신 엔진 순서로 고정 실행
//! 이번 tick에 보낸 세그먼트는 빨라야 다음 tick에 확인됨

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::channel::Channel;
use crate::error::{Direction, Error, Result};
use crate::receiver::{Inbound, ReceiveEngine, ReceiveState};
use crate::sender::{SendEngine, SendState};
use crate::stats::TransferStats;
use crate::Config;

/// 엔드포인트 역할 (생성 시 고정)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// 데이터를 보내고 ACK를 받음
    Sender,

    /// 데이터를 받아 조립하고 ACK를 보냄
    Receiver,
}

/// RDT 계층
pub struct RdtLayer {
    role: Role,
    config: Config,
    send_channel: Option<Arc<dyn Channel>>,
    receive_channel: Option<Arc<dyn Channel>>,
    send_engine: SendEngine,
    receive_engine: ReceiveEngine,
    stats: TransferStats,
}

impl RdtLayer {
    /// 새 RDT 계층 생성
    pub fn new(role: Role, config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            role,
            send_engine: SendEngine::new(&config),
            receive_engine: ReceiveEngine::new(&config),
            config,
            send_channel: None,
            receive_channel: None,
            stats: TransferStats::new(),
        })
    }

    /// 송신 역할 생성
    pub fn sender(config: Config) -> Result<Self> {
        Self::new(Role::Sender, config)
    }

    /// 수신 역할 생성
    pub fn receiver(config: Config) -> Result<Self> {
        Self::new(Role::Receiver, config)
    }

    /// 하위 송신 채널 연결
    pub fn set_send_channel(&mut self, channel: Arc<dyn Channel>) {
        self.send_channel = Some(channel);
    }

    /// 하위 수신 채널 연결
    pub fn set_receive_channel(&mut self, channel: Arc<dyn Channel>) {
        self.receive_channel = Some(channel);
    }

    /// 보낼 데이터 설정 (송신 역할, 한 번만)
    pub fn set_data_to_send(&mut self, data: impl Into<Bytes>) -> Result<()> {
        if self.role != Role::Sender {
            return Err(Error::RoleMismatch {
                role: self.role,
                operation: "set_data_to_send",
            });
        }

        self.send_engine.load(data.into())?;
        Ok(())
    }

    /// 현재까지 순서대로 조립된 데이터
    pub fn data_received(&self) -> &[u8] {
        self.receive_engine.data_received()
    }

    /// 한 time slice 진행 (송신 단계 → 수신 단계)
    pub fn tick(&mut self) -> Result<()> {
        let send_channel = self
            .send_channel
            .clone()
            .ok_or(Error::ChannelNotWired {
                direction: Direction::Send,
            })?;
        let receive_channel = self
            .receive_channel
            .clone()
            .ok_or(Error::ChannelNotWired {
                direction: Direction::Receive,
            })?;

        self.stats.iterations += 1;
        trace!("{:?} tick {}", self.role, self.stats.iterations);

        // 송신 단계
        self.send_engine
            .on_tick(send_channel.as_ref(), &mut self.stats);

        // 수신 단계
        let batch = receive_channel.receive();
        let inbound = Inbound::classify(batch, self.config.data_length, &mut self.stats);

        match self.role {
            Role::Sender => {
                if !inbound.data.is_empty() {
                    debug!("송신 역할에 데이터 세그먼트 {}개 도착, 폐기", inbound.data.len());
                    self.stats.misrouted_segments += inbound.data.len() as u64;
                }
                self.send_engine
                    .on_feedback(&inbound.acks, send_channel.as_ref(), &mut self.stats);
            }
            Role::Receiver => {
                if !inbound.acks.is_empty() {
                    debug!("수신 역할에 ACK {}개 도착, 폐기", inbound.acks.len());
                    self.stats.misrouted_segments += inbound.acks.len() as u64;
                }
                self.receive_engine
                    .process(inbound.data, send_channel.as_ref(), &mut self.stats);
            }
        }

        Ok(())
    }

    /// `tick`과 동일
    pub fn process_data(&mut self) -> Result<()> {
        self.tick()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_iteration(&self) -> u64 {
        self.stats.iterations
    }

    pub fn send_state(&self) -> SendState {
        self.send_engine.state()
    }

    pub fn receive_state(&self) -> ReceiveState {
        self.receive_engine.state()
    }

    /// 송신 완료 여부 (수신 역할은 보낼 것이 없으므로 항상 false)
    pub fn is_drained(&self) -> bool {
        self.send_engine.is_drained()
    }

    /// 송신측 미확인 세그먼트 수
    pub fn outstanding(&self) -> usize {
        self.send_engine
            .window()
            .map_or(0, |window| window.outstanding_count())
    }

    /// 수신측 누락 시퀀스 번호
    pub fn missing(&self) -> Vec<crate::segment::SeqNum> {
        self.receive_engine.missing()
    }

    /// 통계 반환
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }
}

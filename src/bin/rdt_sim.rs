//! RDT 시뮬레이터
//!
//! 송신/수신 RDT 계층 두 개를 장애 주입 채널로 연결해 전송을 재현
//! - 손실, 중복, 지연, 순서 뒤바뀜, 비트 손상 조절
//! - `--trials`: seed를 바꿔가며 병렬 반복 실행 (rayon)
//! - `--threaded`: 역할마다 tokio 태스크 하나씩
//!
//! 사용법:
//!   cargo run --release --bin rdt-sim -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (손실 없는 채널)
//!   cargo run --release --bin rdt-sim
//!
//!   # 파일 전송 + 20% 손실 + 순서 뒤바뀜
//!   cargo run --release --bin rdt-sim -- -f data.txt --drop 0.2 --reorder

use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use rayon::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rdt::channel::ChannelConfig;
use rdt::sim::{self, Simulation, SimulationReport, DEFAULT_MAX_ITERATIONS};
use rdt::Config;

/// 기본 전송 데이터
const DEFAULT_PAYLOAD: &str = "The quick brown fox jumped over the lazy dog while the \
    unreliable channel dropped, duplicated, delayed and scrambled every other segment.";

/// 시뮬레이터 설정
struct SimConfig {
    file_path: Option<PathBuf>,
    config: Config,
    channel: ChannelConfig,
    max_iterations: u64,
    trials: u64,
    threaded: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            config: Config::default(),
            channel: ChannelConfig::reliable(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            trials: 1,
            threaded: false,
        }
    }
}

fn parse_value<T: FromStr>(flag: &str, value: Option<&String>) -> T {
    match value.map(|v| v.parse::<T>()) {
        Some(Ok(parsed)) => parsed,
        _ => {
            eprintln!("{} 옵션에 유효한 값 필요", flag);
            std::process::exit(2);
        }
    }
}

/// 확률 옵션: 0.0~1.0 사이 유한한 값만 허용
fn parse_rate(flag: &str, value: Option<&String>) -> f64 {
    let rate: f64 = parse_value(flag, value);
    if !(0.0..=1.0).contains(&rate) {
        eprintln!("{} 옵션은 0.0~1.0 사이 값이어야 함: {}", flag, rate);
        std::process::exit(2);
    }
    rate
}

fn parse_args() -> SimConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--data-length" => {
                config.config.data_length = parse_value(flag, args.get(i + 1));
                i += 1;
            }
            "--window" | "-w" => {
                config.config.flow_control_window_segments = parse_value(flag, args.get(i + 1));
                i += 1;
            }
            "--drop" => {
                config.channel.drop_rate = parse_rate(flag, args.get(i + 1));
                i += 1;
            }
            "--duplicate" => {
                config.channel.duplicate_rate = parse_rate(flag, args.get(i + 1));
                i += 1;
            }
            "--delay" => {
                config.channel.delay_rate = parse_rate(flag, args.get(i + 1));
                if config.channel.max_delay == 0 {
                    config.channel.max_delay = 3;
                }
                i += 1;
            }
            "--max-delay" => {
                config.channel.max_delay = parse_value(flag, args.get(i + 1));
                i += 1;
            }
            "--reorder" => {
                config.channel.reorder = true;
            }
            "--corrupt" => {
                config.channel.corrupt_rate = parse_rate(flag, args.get(i + 1));
                i += 1;
            }
            "--hostile" => {
                let seed = config.channel.seed;
                config.channel = ChannelConfig::hostile().with_seed(seed);
            }
            "--seed" | "-s" => {
                config.channel.seed = parse_value(flag, args.get(i + 1));
                i += 1;
            }
            "--max-iterations" => {
                config.max_iterations = parse_value(flag, args.get(i + 1));
                i += 1;
            }
            "--trials" | "-t" => {
                config.trials = parse_value::<u64>(flag, args.get(i + 1)).max(1);
                i += 1;
            }
            "--threaded" => {
                config.threaded = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"RDT Simulator - selective-repeat 슬라이딩 윈도우 ARQ

송신/수신 RDT 계층을 장애 주입 채널로 연결해 tick 단위로 전송을 재현

사용법:
  cargo run --release --bin rdt-sim -- [OPTIONS]

옵션:
  -f, --file <PATH>          전송할 파일 경로 (기본: 내장 문장)
  --data-length <BYTES>      세그먼트 페이로드 길이 (기본: 4)
  -w, --window <SEGMENTS>    흐름 제어 윈도우 (기본: 3)
  --drop <RATE>              손실 확률 0.0~1.0
  --duplicate <RATE>         중복 확률 0.0~1.0
  --delay <RATE>             지연 확률 0.0~1.0
  --max-delay <TICKS>        최대 지연 (기본: 3)
  --reorder                  수신 배치 순서 섞기
  --corrupt <RATE>           비트 손상 확률 0.0~1.0
  --hostile                  모든 장애 활성화 프리셋
  -s, --seed <N>             RNG seed (기본: 0)
  --max-iterations <N>       반복 상한 (기본: 100000)
  -t, --trials <N>           seed를 바꿔가며 N회 병렬 실행
  --threaded                 역할별 tokio 태스크로 실행
  -h, --help                 이 도움말 출력

로그 레벨은 RUST_LOG로 조절 (기본: info)

예시:
  # 20% 손실 + 순서 뒤바뀜
  cargo run --release --bin rdt-sim -- --drop 0.2 --reorder

  # 모든 장애, 100회 병렬
  cargo run --release --bin rdt-sim -- --hostile --trials 100
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

/// seed를 바꿔가며 병렬 실행
fn run_trials(sim_config: &SimConfig, payload: &Bytes) -> rdt::Result<Vec<SimulationReport>> {
    (0..sim_config.trials)
        .into_par_iter()
        .map(|trial| {
            let channel = sim_config
                .channel
                .clone()
                .with_seed(sim_config.channel.seed.wrapping_add(trial * 2));
            Simulation::simulated(sim_config.config.clone(), payload.clone(), channel)?
                .with_max_iterations(sim_config.max_iterations)
                .run()
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let sim_config = parse_args();
    sim_config.config.validate()?;

    let payload = match &sim_config.file_path {
        Some(path) => {
            info!("Loading file: {:?}", path);
            Bytes::from(std::fs::read(path)?)
        }
        None => Bytes::from_static(DEFAULT_PAYLOAD.as_bytes()),
    };

    info!("RDT Simulator starting...");
    info!("Data size: {} bytes", payload.len());
    info!(
        "Segments: {} x {} bytes, window {}",
        sim_config.config.segments_for(payload.len()),
        sim_config.config.data_length,
        sim_config.config.flow_control_window_segments
    );
    info!(
        "Channel: drop {:.1}%, duplicate {:.1}%, delay {:.1}% (max {}), reorder {}, corrupt {:.1}%, seed {}",
        sim_config.channel.drop_rate * 100.0,
        sim_config.channel.duplicate_rate * 100.0,
        sim_config.channel.delay_rate * 100.0,
        sim_config.channel.max_delay,
        sim_config.channel.reorder,
        sim_config.channel.corrupt_rate * 100.0,
        sim_config.channel.seed
    );

    let reports = if sim_config.threaded {
        info!("Mode: threaded (tokio task per role)");
        vec![
            sim::run_threaded(
                sim_config.config.clone(),
                payload.clone(),
                sim_config.channel.clone(),
                sim_config.max_iterations,
            )
            .await?,
        ]
    } else {
        info!("Mode: {} trial(s)", sim_config.trials);
        run_trials(&sim_config, &payload)?
    };

    let mut failures = 0;
    for (trial, report) in reports.iter().enumerate() {
        let matched = report.received[..] == payload[..];
        if report.completed && matched {
            info!("Trial {}: {}", trial, report.summary());
        } else {
            error!("Trial {} incomplete: {}", trial, report.summary());
            failures += 1;
        }
    }

    if reports.len() > 1 {
        let total_iterations: u64 = reports.iter().map(|r| r.iterations).sum();
        let total_retransmits: u64 = reports
            .iter()
            .map(|r| r.sender_stats.retransmitted_segments)
            .sum();
        info!(
            "Trials: {} ok / {} failed, avg iterations {:.1}, avg retransmits {:.1}",
            reports.len() - failures,
            failures,
            total_iterations as f64 / reports.len() as f64,
            total_retransmits as f64 / reports.len() as f64
        );
    }

    if failures > 0 {
        std::process::exit(1);
    }

    if reports.len() == 1 {
        info!(
            "Received: {:?}",
            String::from_utf8_lossy(&reports[0].received)
        );
    }

    Ok(())
}

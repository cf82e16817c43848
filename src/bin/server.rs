//! REP 에코 서버 - Reliable Echo Protocol
//!
//! 장애 주입 에코 서버 (TCP + UDP 동시 리슨)
//! - 메시지마다 확률적으로 드롭/지연/손상 후 에코
//! - --plain 시 무손상 에코 + 유휴 TCP 연결 퇴출
//!
//! 사용법:
//!   cargo run --release --bin rep-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 장애 주입 (loss 0.25, delay 0.25, corrupt 0.30)
//!   cargo run --release --bin rep-server -- --bind 0.0.0.0:28000
//!
//!   # 손상만 100%
//!   cargo run --release --bin rep-server -- --loss 0 --delay 0 --corrupt 1.0

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rep::server::{EchoServer, ServerMode};
use rep::{Config, DEFAULT_PORT};

/// 서버 실행 설정
struct ServerArgs {
    bind_addr: SocketAddr,
    plain: bool,
    config: Config,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT).parse().unwrap(),
            plain: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = ServerArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    parsed.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--loss" => {
                if i + 1 < args.len() {
                    parsed.config.impairment.loss_prob =
                        args[i + 1].parse().expect("유효한 확률 필요");
                    i += 1;
                }
            }
            "--delay" => {
                if i + 1 < args.len() {
                    parsed.config.impairment.delay_prob =
                        args[i + 1].parse().expect("유효한 확률 필요");
                    i += 1;
                }
            }
            "--corrupt" => {
                if i + 1 < args.len() {
                    parsed.config.impairment.corrupt_prob =
                        args[i + 1].parse().expect("유효한 확률 필요");
                    i += 1;
                }
            }
            "--max-delay" => {
                if i + 1 < args.len() {
                    parsed.config.impairment.max_delay_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--idle-timeout" => {
                if i + 1 < args.len() {
                    parsed.config.idle_timeout_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--plain" | "-p" => {
                parsed.plain = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"REP Server - Reliable Echo Protocol 에코 서버

TCP + UDP 동시 리슨, 메시지마다 확률적으로 드롭/지연/손상 후 에코

사용법:
  cargo run --release --bin rep-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:28000)
  --loss <PROB>           드롭 확률 0.0~1.0 (기본: 0.25)
  --delay <PROB>          지연 확률 0.0~1.0 (기본: 0.25)
  --corrupt <PROB>        손상 확률 0.0~1.0 (기본: 0.30)
  --max-delay <MS>        지연 상한 밀리초 (기본: 2000)
  -p, --plain             장애 주입 없이 일반 에코 + 유휴 연결 퇴출
  --idle-timeout <MS>     유휴 퇴출 한도 밀리초, --plain 전용 (기본: 60000)
  -h, --help              이 도움말 출력

예시:
  # 기본 장애 주입
  cargo run --release --bin rep-server

  # 손상만 100% (재전송 한도 테스트용)
  cargo run --release --bin rep-server -- --loss 0 --delay 0 --corrupt 1.0

  # 일반 에코, 10초 유휴 퇴출
  cargo run --release --bin rep-server -- --plain --idle-timeout 10000
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args();
    let mode = if args.plain {
        ServerMode::Plain
    } else {
        ServerMode::Impaired
    };

    info!("REP Server starting...");
    info!("Bind address: {}", args.bind_addr);
    match mode {
        ServerMode::Impaired => {
            let imp = &args.config.impairment;
            info!(
                "Impairment: loss {:.0}% | delay {:.0}% (max {}ms) | corrupt {:.0}%",
                imp.loss_prob * 100.0,
                imp.delay_prob * 100.0,
                imp.max_delay_ms,
                imp.corrupt_prob * 100.0,
            );
        }
        ServerMode::Plain => {
            info!(
                "Plain echo mode (idle timeout: {}ms)",
                args.config.idle_timeout_ms
            );
        }
    }

    // 소켓 바인딩 (TCP/UDP 같은 포트)
    let listener = TcpListener::bind(args.bind_addr).await?;
    let udp_socket = UdpSocket::bind(args.bind_addr).await?;

    let server = Arc::new(EchoServer::new(args.config, mode));

    let tcp_task = tokio::spawn(server.clone().run_tcp(listener));
    let udp_task = tokio::spawn(server.clone().run_udp(udp_socket));

    info!("Server running (TCP + UDP)");

    // 협조적 종료: ctrl+c 수신 시 리스너 태스크 정리
    tokio::signal::ctrl_c().await?;
    info!("Server shutting down...");

    tcp_task.abort();
    udp_task.abort();

    Ok(())
}

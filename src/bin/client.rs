//! REP 클라이언트 - Reliable Echo Protocol
//!
//! 대화형 신뢰성 에코 클라이언트
//! - 표준 입력 한 줄 = 메시지 한 건, 체크섬 검증 + 제한 재전송
//! - 난독화(XOR + base64) 선택 적용
//! - 세션 종료 시 성공률/평균 RTT 보고
//!
//! 사용법:
//!   cargo run --release --bin rep-client -- [OPTIONS]
//!
//! 예시:
//!   # TCP + 난독화
//!   cargo run --release --bin rep-client -- --server 127.0.0.1:28000 --tcp --obfuscate
//!
//!   # UDP 평문
//!   cargo run --release --bin rep-client -- --udp

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rep::session::{Protocol, Session};
use rep::{Config, Error, DEFAULT_PORT};

/// 클라이언트 실행 설정
struct ClientArgs {
    server_addr: SocketAddr,
    protocol: Protocol,
    config: Config,
}

impl Default for ClientArgs {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT).parse().unwrap(),
            protocol: Protocol::Tcp,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ClientArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = ClientArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    parsed.server_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--protocol" => {
                if i + 1 < args.len() {
                    parsed.protocol =
                        Protocol::parse(&args[i + 1]).expect("tcp 또는 udp 필요");
                    i += 1;
                }
            }
            "--tcp" => parsed.protocol = Protocol::Tcp,
            "--udp" => parsed.protocol = Protocol::Udp,
            "--obfuscate" | "-o" => parsed.config.obfuscate = true,
            "--key" | "-k" => {
                if i + 1 < args.len() {
                    parsed.config.key = args[i + 1].clone();
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    parsed.config.max_retries = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--timeout" => {
                if i + 1 < args.len() {
                    parsed.config.reply_timeout_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"REP Client - Reliable Echo Protocol 클라이언트

표준 입력 한 줄을 메시지 한 건으로 전송하고 에코 응답을 체크섬으로 검증
- 타임아웃/손상 시 재전송 (기본 3회), 초과 시 해당 메시지만 포기
- 난독화(XOR 키스트림 + base64) 선택 적용

사용법:
  cargo run --release --bin rep-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>    서버 주소 (기본: 127.0.0.1:28000)
  --protocol <P>         전송 종류 tcp/udp (기본: tcp)
  --tcp / --udp          전송 종류 단축 지정
  -o, --obfuscate        난독화 활성화
  -k, --key <KEY>        난독화 키 (기본: ace6143)
  --retries <N>          메시지당 최대 재전송 횟수 (기본: 3)
  --timeout <MS>         응답 대기 타임아웃 밀리초 (기본: 5000)
  -h, --help             이 도움말 출력

예시:
  # TCP + 난독화
  cargo run --release --bin rep-client -- -s 127.0.0.1:28000 --tcp -o

  # UDP, 짧은 타임아웃
  cargo run --release --bin rep-client -- --udp --timeout 1000
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

    info!("REP Client starting...");
    info!("Server address: {}", args.server_addr);
    info!("Protocol: {}", args.protocol.as_str());
    info!("Obfuscation: {}", args.config.obfuscate);

    let mut session = Session::connect(args.protocol, args.server_addr, args.config).await?;

    info!("Type messages (ctrl+c to quit):");
    println!("{}", "-".repeat(30));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Disconnecting...");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let msg = line.trim();
                if msg.is_empty() {
                    continue;
                }

                match session.send_message(msg).await {
                    Ok(reply) => {
                        info!("[RECV] {}", reply.text.trim_end());
                        info!("[RECV] Checksum: {}", reply.reply_token);
                        info!("[TIME] RTT: {:.1}ms", reply.rtt.as_secs_f64() * 1000.0);
                    }
                    Err(Error::RetryExceeded { attempts }) => {
                        // 이 메시지만 포기하고 다음 입력으로 넘어간다
                        error!("Retries exceeded ({} attempts). Message failed.", attempts);
                    }
                    Err(e) => {
                        warn!("Session error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // 세션 정리 및 통계 보고 (한 번만)
    let stats = session.close().await;
    info!("{}", stats.summary());

    Ok(())
}

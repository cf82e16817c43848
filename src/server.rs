//! 에코 리스너 (TCP/UDP)
//!
//! 두 리스너 루프가 하나의 장애 주입 엔진을 공유한다.
//! - 스트림 리스너: 연결당 독립 워커 스폰, 프레임 단위 읽기 → 장애 적용 → 에코
//! - 데이터그램 리스너: 단일 루프, 수신 → 장애 적용 → 발신자에게 에코
//!
//! 일반 모드(장애 주입 없음)에서는 유휴 TCP 연결을 퇴출한다. 연결 활동
//! 시각은 단일 뮤텍스로 보호되는 맵에 기록된다: accept 시 생성, 수신마다
//! 갱신, 연결 종료/퇴출 시 제거.
//!
//! 드롭/손상된 메시지는 시뮬레이션된 정상 동작이며, 어떤 오류도 리스너
//! 프로세스를 중단시키지 않는다.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::impairment::{corrupt_one_bit, Decision, Impairment};
use crate::Config;

/// 유휴 확인 주기 (일반 모드 TCP 읽기 타임아웃)
const IDLE_POLL: Duration = Duration::from_secs(1);

/// 서버 동작 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// 장애 주입 에코 (드롭/지연/손상)
    Impaired,
    /// 무손상 에코 + 유휴 연결 퇴출
    Plain,
}

/// 에코 서버
///
/// 바인딩은 호출측(바이너리/테스트)이 수행하고, `run_tcp`/`run_udp`에
/// 소켓을 넘긴다. 두 리스너는 같은 인스턴스를 Arc로 공유한다.
pub struct EchoServer {
    config: Config,
    mode: ServerMode,
    engine: Impairment,
    /// 활성 TCP 연결의 마지막 활동 시각
    activity: Mutex<HashMap<SocketAddr, Instant>>,
}

impl EchoServer {
    pub fn new(config: Config, mode: ServerMode) -> Self {
        Self {
            engine: Impairment::new(config.impairment),
            config,
            mode,
            activity: Mutex::new(HashMap::new()),
        }
    }

    /// 활성 TCP 연결 수
    pub fn active_connections(&self) -> usize {
        self.activity.lock().len()
    }

    /// 스트림 리스너: 연결마다 워커를 스폰한다
    pub async fn run_tcp(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("[TCP] Listening on {}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_tcp(stream, addr).await;
                    });
                }
                Err(e) => {
                    warn!("[TCP] Accept failed: {}", e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// 연결 하나의 에코 워커
    ///
    /// 0바이트 읽기는 피어 종료를 의미하며 워커를 끝낸다. 연결은 종료 시
    /// 닫히고 활동 맵에서 제거된다.
    async fn handle_tcp(&self, mut stream: TcpStream, addr: SocketAddr) {
        self.activity.lock().insert(addr, Instant::now());
        info!("[TCP] Connected {}", addr);

        let mut buf = vec![0u8; self.config.max_msg];
        loop {
            let n = match self.read_frame(&mut stream, addr, &mut buf).await {
                Some(n) => n,
                None => break,
            };
            if n == 0 {
                break;
            }
            self.activity.lock().insert(addr, Instant::now());

            let mut frame = buf[..n].to_vec();
            info!("[TCP] {} -> {}", addr, String::from_utf8_lossy(&frame).trim_end());

            if !self.shape_frame(&mut frame, "TCP", addr).await {
                continue; // 드롭: 응답 없음
            }
            if stream.write_all(&frame).await.is_err() {
                break;
            }
        }

        self.activity.lock().remove(&addr);
        info!("[TCP] Disconnected {}", addr);
    }

    /// 프레임 읽기
    ///
    /// 일반 모드에서는 IDLE_POLL 타임아웃으로 읽어 유휴 상태를 주기적으로
    /// 확인하고, 한도를 넘긴 연결을 퇴출한다. None은 워커 종료를 뜻한다.
    async fn read_frame(
        &self,
        stream: &mut TcpStream,
        addr: SocketAddr,
        buf: &mut [u8],
    ) -> Option<usize> {
        match self.mode {
            ServerMode::Impaired => stream.read(buf).await.ok(),
            ServerMode::Plain => loop {
                match timeout(IDLE_POLL, stream.read(buf)).await {
                    Ok(result) => return result.ok(),
                    Err(_) => {
                        let last = self.activity.lock().get(&addr).copied();
                        let idle = last.map(|t| t.elapsed()).unwrap_or_default();
                        if idle > self.config.idle_timeout() {
                            info!("[TCP] Kicked {} (idle)", addr);
                            return None;
                        }
                    }
                }
            },
        }
    }

    /// 데이터그램 리스너: 단일 루프
    ///
    /// 지연이 결정되면 이 루프가 sleep하므로 이후 데이터그램 처리도 지연이
    /// 끝날 때까지 보류된다 (단일 루프 설계의 일부).
    pub async fn run_udp(self: Arc<Self>, socket: UdpSocket) {
        if let Ok(addr) = socket.local_addr() {
            info!("[UDP] Listening on {}", addr);
        }

        let mut buf = vec![0u8; self.config.max_msg];
        loop {
            let (n, addr) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!("[UDP] Receive failed: {}", e);
                    continue;
                }
            };

            let mut frame = buf[..n].to_vec();
            info!("[UDP] {} -> {}", addr, String::from_utf8_lossy(&frame).trim_end());

            if !self.shape_frame(&mut frame, "UDP", addr).await {
                continue;
            }
            let _ = socket.send_to(&frame, addr).await;
        }
    }

    /// 장애 주입 적용. false면 드롭 (응답을 보내지 않음)
    async fn shape_frame(&self, frame: &mut Vec<u8>, tag: &str, addr: SocketAddr) -> bool {
        if self.mode == ServerMode::Plain {
            return true;
        }

        match self.engine.decide() {
            Decision::Drop => {
                warn!("[{}] Dropped packet from {}", tag, addr);
                false
            }
            Decision::Forward { delay, corrupt } => {
                if let Some(d) = delay {
                    warn!("[{}] Delaying {:.1}s packet from {}", tag, d.as_secs_f64(), addr);
                    sleep(d).await;
                }
                if corrupt {
                    corrupt_one_bit(frame);
                    warn!("[{}] Corrupted packet from {}", tag, addr);
                }
                true
            }
        }
    }
}

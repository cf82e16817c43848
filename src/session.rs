//! 신뢰성 클라이언트 세션
//!
//! - 난독화 코덱 + 체크섬 검증 + 전송 I/O를 제한 재전송으로 오케스트레이션
//! - TCP(스트림) / UDP(데이터그램) 공용
//! - 시도 상태 기계: Sending → AwaitingReply → {Success, Retry, Exhausted}

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::checksum::checksum;
use crate::codec;
use crate::stats::SessionStats;
use crate::{Config, Error, Result};

/// 전송 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// 스트림 (연결 지향, 순서 보장)
    Tcp,
    /// 데이터그램 (비연결, 순서 비보장)
    Udp,
}

impl Protocol {
    /// 인자 문자열 파싱 ("tcp" / "udp")
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// 열린 전송 엔드포인트
#[derive(Debug)]
enum Endpoint {
    Tcp(TcpStream),
    Udp { socket: UdpSocket, remote: SocketAddr },
}

/// 검증된 메시지 한 건의 결과
#[derive(Debug, Clone)]
pub struct Reply {
    /// 복호화된 응답 텍스트 (디코딩 실패 시 수신 원문)
    pub text: String,

    /// 전송한 페이로드의 체크섬 토큰
    pub sent_token: String,

    /// 응답의 체크섬 토큰 (검증 통과 시 sent_token과 동일)
    pub reply_token: String,

    /// 왕복 시간 (첫 전송 직전 ~ 검증된 응답 직후)
    pub rtt: Duration,
}

/// 신뢰성 클라이언트 세션
///
/// 통계는 이 세션이 단독 소유하며 검증된 왕복 이후에만 갱신된다.
#[derive(Debug)]
pub struct Session {
    protocol: Protocol,
    endpoint: Endpoint,
    config: Config,
    stats: SessionStats,
}

impl Session {
    /// 원격 주소로 세션 수립
    ///
    /// 연결 수립은 `connect_attempts`회까지 재시도하며 (간격
    /// `connect_retry_ms`), 모두 실패하면 `ConnectFailed`로 세션을 포기한다.
    pub async fn connect(protocol: Protocol, remote: SocketAddr, config: Config) -> Result<Self> {
        config.validate()?;

        for attempt in 1..=config.connect_attempts {
            match Self::open_endpoint(protocol, remote, config.reply_timeout()).await {
                Ok(endpoint) => {
                    match protocol {
                        Protocol::Tcp => info!("[TCP] Connected to {}", remote),
                        Protocol::Udp => info!("[UDP] Ready to send to {}", remote),
                    }
                    return Ok(Self {
                        protocol,
                        endpoint,
                        config,
                        stats: SessionStats::new(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Connect attempt {}/{} failed: {}",
                        attempt, config.connect_attempts, e
                    );
                    if attempt < config.connect_attempts {
                        sleep(config.connect_retry()).await;
                    }
                }
            }
        }

        Err(Error::ConnectFailed {
            attempts: config.connect_attempts,
        })
    }

    async fn open_endpoint(
        protocol: Protocol,
        remote: SocketAddr,
        connect_timeout: Duration,
    ) -> std::io::Result<Endpoint> {
        match protocol {
            Protocol::Tcp => {
                let stream = timeout(connect_timeout, TcpStream::connect(remote))
                    .await
                    .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
                Ok(Endpoint::Tcp(stream))
            }
            Protocol::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                Ok(Endpoint::Udp { socket, remote })
            }
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// 메시지 전송 및 검증된 응답 수신
    ///
    /// 타임아웃/손상은 시도 하나를 소모하고 재전송한다. `max_retries`회
    /// 모두 실패하면 해당 메시지만 `RetryExceeded`로 종결되고 세션은
    /// 계속 사용할 수 있다.
    pub async fn send_message(&mut self, plaintext: &str) -> Result<Reply> {
        // 1. 난독화 (활성 시): 페이로드는 인코딩된 텍스트의 바이트 열
        let wire_text = if self.config.obfuscate {
            debug!("message obfuscated (key len {})", self.config.key.len());
            codec::encode(plaintext, &self.config.key)
        } else {
            plaintext.to_string()
        };
        let payload = wire_text.into_bytes();

        // 2. 전송 페이로드의 토큰. 재전송 검증은 항상 이 토큰과 비교한다
        //    (서버는 장애가 없는 한 페이로드를 그대로 에코).
        let sent_token = checksum(&payload);
        info!("[SEND] Checksum: {}", sent_token);

        self.stats.record_sent();
        let start = Instant::now();

        // 3. 제한 시도 루프: Sending → AwaitingReply → {Success, Retry}
        //    타임아웃/손상만 시도를 소모하고, 그 외 오류는 즉시 전파된다.
        for attempt in 1..=self.config.max_retries {
            match self.attempt(&payload, &sent_token).await {
                Ok(reply_bytes) => {
                    let rtt = start.elapsed();
                    return Ok(self.accept_reply(reply_bytes, sent_token, rtt));
                }
                Err(e @ (Error::Timeout | Error::Corrupted { .. })) => {
                    warn!("{} (attempt {}), retransmitting...", e, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        // 4. Exhausted: 이 메시지만 포기
        Err(Error::RetryExceeded {
            attempts: self.config.max_retries,
        })
    }

    /// 시도 한 번: 전송 후 제한 대기, 체크섬 검증
    async fn attempt(&mut self, payload: &[u8], sent_token: &str) -> Result<Vec<u8>> {
        self.transmit(payload).await?;

        let reply = match timeout(self.config.reply_timeout(), self.receive()).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout),
        };

        let got = checksum(&reply);
        if got != sent_token {
            return Err(Error::Corrupted {
                expected: sent_token.to_string(),
                got,
            });
        }
        Ok(reply)
    }

    async fn transmit(&mut self, payload: &[u8]) -> Result<()> {
        match &mut self.endpoint {
            Endpoint::Tcp(stream) => stream.write_all(payload).await?,
            Endpoint::Udp { socket, remote } => {
                socket.send_to(payload, *remote).await?;
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.config.max_msg];
        match &mut self.endpoint {
            Endpoint::Tcp(stream) => {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
                buf.truncate(n);
            }
            Endpoint::Udp { socket, .. } => {
                let (n, _) = socket.recv_from(&mut buf).await?;
                buf.truncate(n);
            }
        }
        Ok(buf)
    }

    /// 검증된 응답 처리: 복호화(실패 시 원문 유지), 통계 갱신
    fn accept_reply(&mut self, reply_bytes: Vec<u8>, sent_token: String, rtt: Duration) -> Reply {
        let reply_token = checksum(&reply_bytes);
        let wire_text = String::from_utf8_lossy(&reply_bytes).into_owned();

        let text = if self.config.obfuscate {
            match codec::decode(&wire_text, &self.config.key) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!("Decode failed ({}), keeping raw reply", e);
                    wire_text
                }
            }
        } else {
            wire_text
        };

        self.stats.record_round_trip(rtt);

        Reply {
            text,
            sent_token,
            reply_token,
            rtt,
        }
    }

    /// 세션 종료
    ///
    /// 엔드포인트는 여기서 정확히 한 번 닫힌다 (self 소비).
    pub async fn close(mut self) -> SessionStats {
        if let Endpoint::Tcp(stream) = &mut self.endpoint {
            let _ = stream.shutdown().await;
        }
        info!("Session closed ({})", self.protocol.as_str());
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impairment::ImpairmentConfig;
    use crate::server::{EchoServer, ServerMode};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn spawn_echo_server(impairment: ImpairmentConfig) -> SocketAddr {
        let mut config = Config::clean();
        config.impairment = impairment;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let udp = UdpSocket::bind(listener.local_addr().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(EchoServer::new(config, ServerMode::Impaired));
        tokio::spawn(server.clone().run_tcp(listener));
        tokio::spawn(server.run_udp(udp));
        addr
    }

    #[tokio::test]
    async fn test_clean_hello_round_trip() {
        let addr = spawn_echo_server(ImpairmentConfig::off()).await;

        let mut session = Session::connect(Protocol::Tcp, addr, Config::clean())
            .await
            .unwrap();
        let reply = session.send_message("hello").await.unwrap();

        assert_eq!(reply.text, "hello");
        assert_eq!(reply.sent_token, reply.reply_token);

        let stats = session.close().await;
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.received, 1);
    }

    #[tokio::test]
    async fn test_obfuscated_ping_over_udp() {
        let addr = spawn_echo_server(ImpairmentConfig::off()).await;

        let mut config = Config::clean();
        config.obfuscate = true;

        let mut session = Session::connect(Protocol::Udp, addr, config).await.unwrap();
        let reply = session.send_message("ping").await.unwrap();

        // 서버는 와이어 페이로드(base64 텍스트)를 그대로 에코, 클라이언트가 복원
        assert_eq!(reply.text, "ping");
        assert_eq!(reply.sent_token, reply.reply_token);
    }

    #[tokio::test]
    async fn test_always_corrupting_server_exhausts_retries() {
        // 모든 에코를 1비트 손상시키는 서버: 시도 횟수를 직접 센다
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let server_attempts = attempts.clone();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            loop {
                let n = match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                server_attempts.fetch_add(1, Ordering::SeqCst);
                let mut frame = buf[..n].to_vec();
                frame[0] ^= 0x01;
                if stream.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        let mut session = Session::connect(Protocol::Tcp, addr, Config::clean())
            .await
            .unwrap();
        let err = session.send_message("doomed").await.unwrap_err();

        assert!(matches!(err, Error::RetryExceeded { attempts: 3 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let stats = session.close().await;
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.received, 0);
    }

    #[tokio::test]
    async fn test_silent_server_times_out_and_exhausts_retries() {
        // 응답하지 않는 서버: 타임아웃 경로로 재시도 소진
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let server_attempts = attempts.clone();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        server_attempts.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });

        let mut config = Config::clean();
        config.reply_timeout_ms = 100;

        let mut session = Session::connect(Protocol::Tcp, addr, config).await.unwrap();
        let err = session.send_message("void").await.unwrap_err();

        assert!(matches!(err, Error::RetryExceeded { attempts: 3 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(session.stats().received, 0);
    }

    #[tokio::test]
    async fn test_session_survives_retry_exceeded() {
        // 드롭만 하는 UDP 서버 → 전량 드롭이면 RetryExceeded, 이후 메시지는 계속
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();

        // 처음 3개 데이터그램은 무시하고 이후부터 에코
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let mut seen = 0u32;
            loop {
                let (n, peer) = match udp.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                seen += 1;
                if seen > 3 {
                    let _ = udp.send_to(&buf[..n], peer).await;
                }
            }
        });

        let mut config = Config::clean();
        config.reply_timeout_ms = 100;

        let mut session = Session::connect(Protocol::Udp, addr, config).await.unwrap();

        let err = session.send_message("dropped").await.unwrap_err();
        assert!(matches!(err, Error::RetryExceeded { .. }));

        let reply = session.send_message("after").await.unwrap();
        assert_eq!(reply.text, "after");

        let stats = session.close().await;
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.received, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        // 리슨하지 않는 포트로 TCP 연결 시도
        let mut config = Config::clean();
        config.connect_attempts = 2;
        config.connect_retry_ms = 10;
        config.reply_timeout_ms = 200;

        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = Session::connect(Protocol::Tcp, addr, config).await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { attempts: 2 }));
    }
}

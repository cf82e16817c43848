//! # REP (Reliable Echo Protocol)
//!
//! TCP/UDP 기반 체크섬 검증 + 재전송 에코 프로토콜
//!
//! ## 핵심 특징
//! - **체크섬 검증**: 에코 응답의 CRC 토큰 비교로 전송 중 손상 감지
//! - **제한 재전송**: 타임아웃/손상 시 최대 3회 재시도, 초과 시 해당 메시지만 포기
//! - **난독화 코덱**: XOR 키스트림 + base64 텍스트 인코딩 (가역, 비암호화)
//! - **장애 주입 서버**: 확률 기반 드롭/지연/손상 시뮬레이션 (TCP/UDP 동일 적용)
//! - **왕복 통계**: 성공률, 평균 RTT를 세션 종료 시 한 번 보고

pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod impairment;
pub mod server;
pub mod session;
pub mod stats;

pub use checksum::checksum;
pub use codec::{decode, encode, DecodeError};
pub use config::Config;
pub use error::{Error, Result};
pub use impairment::{Impairment, ImpairmentConfig};
pub use server::{EchoServer, ServerMode};
pub use session::{Protocol, Reply, Session};
pub use stats::SessionStats;

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 28000;

/// 메시지 프레임 최대 크기 (바이트)
pub const MAX_MSG: usize = 1024;

/// 메시지당 최대 재전송 횟수
pub const MAX_RETRIES: u32 = 3;

/// 기본 난독화 키
pub const DEFAULT_KEY: &str = "ace6143";

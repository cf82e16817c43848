//! 에러 타입 정의

use thiserror::Error;

/// REP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("응답 타임아웃")]
    Timeout,

    #[error("체크섬 불일치: expected {expected}, got {got}")]
    Corrupted { expected: String, got: String },

    #[error("디코딩 실패: {0}")]
    Decode(#[from] crate::codec::DecodeError),

    #[error("재전송 한도 초과: {attempts}회 시도 후 포기")]
    RetryExceeded { attempts: u32 },

    #[error("연결 실패: {attempts}회 시도 후 포기")]
    ConnectFailed { attempts: u32 },

    #[error("유효하지 않은 난독화 키 (빈 키)")]
    InvalidKey,

    #[error("연결 종료")]
    ConnectionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

//! 프로토콜 설정

use std::time::Duration;

use crate::impairment::ImpairmentConfig;
use crate::{Error, Result, DEFAULT_KEY, MAX_MSG, MAX_RETRIES};

/// REP 프로토콜 설정
///
/// 클라이언트 세션과 에코 서버가 공유한다. 주소/전송 종류 등 실행 단위
/// 옵션은 각 바이너리의 인자 파싱에서 결정된다.
#[derive(Debug, Clone)]
pub struct Config {
    /// 난독화 활성화
    pub obfuscate: bool,

    /// 난독화 키 (난독화 활성 시 비어 있으면 안 됨)
    pub key: String,

    /// 메시지당 최대 재전송 횟수
    pub max_retries: u32,

    /// 응답 대기 타임아웃 (밀리초)
    pub reply_timeout_ms: u64,

    /// 연결 수립 시도 횟수
    pub connect_attempts: u32,

    /// 연결 재시도 간격 (밀리초)
    pub connect_retry_ms: u64,

    /// 메시지 프레임 최대 크기 (바이트)
    pub max_msg: usize,

    /// 장애 주입 설정 (서버측)
    pub impairment: ImpairmentConfig,

    /// TCP 유휴 연결 퇴출 타임아웃 (밀리초, 일반 에코 모드 전용)
    pub idle_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            obfuscate: false,
            key: DEFAULT_KEY.to_string(),
            max_retries: MAX_RETRIES,       // 3회
            reply_timeout_ms: 5000,         // 5초
            connect_attempts: 3,
            connect_retry_ms: 1000,         // 1초
            max_msg: MAX_MSG,               // 1024 bytes
            impairment: ImpairmentConfig::default(),
            idle_timeout_ms: 60_000,        // 60초
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 장애 주입 없는 설정 (검증/테스트용)
    pub fn clean() -> Self {
        Self {
            impairment: ImpairmentConfig::off(),
            ..Self::default()
        }
    }

    /// 불안정한 네트워크 시뮬레이션용 설정
    pub fn unstable() -> Self {
        Self {
            impairment: ImpairmentConfig {
                loss_prob: 0.40,
                delay_prob: 0.40,
                corrupt_prob: 0.50,
                max_delay_ms: 4000,
            },
            reply_timeout_ms: 8000,
            ..Self::default()
        }
    }

    /// 설정 검증
    ///
    /// 난독화가 켜진 채 빈 키가 들어오면 XOR 키스트림이 정의되지 않는다.
    pub fn validate(&self) -> Result<()> {
        if self.obfuscate && self.key.is_empty() {
            return Err(Error::InvalidKey);
        }
        Ok(())
    }

    /// 응답 대기 타임아웃
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// 연결 재시도 간격
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    /// 유휴 퇴출 타임아웃
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

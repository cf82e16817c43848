//! 장애 주입 엔진
//!
//! 인바운드 메시지마다 드롭/지연/손상을 독립 베르누이 시행으로 결정한다.
//! TCP/UDP 리스너가 동일한 엔진을 공유하며, 전송 종류와 무관하게 같은
//! 확률 모델이 적용된다.
//!
//! - 드롭: 응답을 보내지 않음 (클라이언트는 타임아웃으로 관측)
//! - 지연: [0.5초, max_delay] 균등 분포만큼 응답 보류
//! - 손상: 프레임에서 비트 하나를 무작위로 플립
//!
//! 드롭이 결정되면 나머지 시행은 생략된다 (보낼 것이 없음). 지연과 손상은
//! 독립이므로 한 메시지가 지연된 뒤 손상될 수 있다.

use std::time::Duration;

use rand::Rng;

/// 지연 최솟값 (밀리초)
pub const MIN_DELAY_MS: u64 = 500;

/// 장애 주입 확률 설정
#[derive(Debug, Clone, Copy)]
pub struct ImpairmentConfig {
    /// 드롭 확률 (0.0 ~ 1.0)
    pub loss_prob: f64,

    /// 지연 확률 (0.0 ~ 1.0)
    pub delay_prob: f64,

    /// 손상 확률 (0.0 ~ 1.0)
    pub corrupt_prob: f64,

    /// 지연 상한 (밀리초)
    pub max_delay_ms: u64,
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            loss_prob: 0.25,
            delay_prob: 0.25,
            corrupt_prob: 0.30,
            max_delay_ms: 2000,     // 2초
        }
    }
}

impl ImpairmentConfig {
    /// 장애 주입 비활성 (완전 통과)
    pub fn off() -> Self {
        Self {
            loss_prob: 0.0,
            delay_prob: 0.0,
            corrupt_prob: 0.0,
            max_delay_ms: 0,
        }
    }
}

/// 메시지 한 건에 대한 장애 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 메시지 폐기, 응답 없음
    Drop,

    /// 응답 전송 (선택적 지연/손상 적용)
    Forward {
        delay: Option<Duration>,
        corrupt: bool,
    },
}

impl Decision {
    pub fn is_drop(&self) -> bool {
        matches!(self, Decision::Drop)
    }
}

/// 장애 주입 엔진
///
/// 결정(`decide`)과 적용(지연 sleep, `corrupt_one_bit`)을 분리해
/// 확률 법칙을 sleep 없이 단위 테스트할 수 있게 한다.
#[derive(Debug, Clone)]
pub struct Impairment {
    config: ImpairmentConfig,
}

impl Impairment {
    pub fn new(config: ImpairmentConfig) -> Self {
        Self { config }
    }

    /// 메시지 한 건의 장애 결정
    pub fn decide(&self) -> Decision {
        let mut rng = rand::thread_rng();

        // 설정값이 범위를 벗어나도 gen_bool이 panic하지 않도록 clamp
        if rng.gen_bool(self.config.loss_prob.clamp(0.0, 1.0)) {
            return Decision::Drop;
        }

        let delay = if rng.gen_bool(self.config.delay_prob.clamp(0.0, 1.0)) {
            let max = self.config.max_delay_ms.max(MIN_DELAY_MS);
            Some(Duration::from_millis(rng.gen_range(MIN_DELAY_MS..=max)))
        } else {
            None
        };

        let corrupt = rng.gen_bool(self.config.corrupt_prob.clamp(0.0, 1.0));

        Decision::Forward { delay, corrupt }
    }
}

/// 프레임에서 비트 하나를 무작위로 플립
///
/// 빈 프레임은 그대로 둔다.
pub fn corrupt_one_bit(frame: &mut [u8]) {
    if frame.is_empty() {
        return;
    }
    let mut rng = rand::thread_rng();
    let byte = rng.gen_range(0..frame.len());
    let bit = rng.gen_range(0..8u8);
    frame[byte] ^= 1 << bit;
}

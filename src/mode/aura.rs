//! The aura pendant role.
//!
//! An aura mostly just broadcasts its affinity and level. The one decision it makes on its own
//! is whether it is surrounded: an opposing aura broadcasting the hostile-environment level
//! starts a debounce counter, and only after [`HOSTILE_ENVIRONMENT_THRESHOLD`] uninterrupted
//! hostile cycles does the pendant deactivate. The hostile flag is consumed every cycle, so
//! holding the pendant down requires continuous re-detection; clean cycles wind the counter
//! back down and eventually reactivate it.
//!
//! Unity pendants are friendly to everyone and never deactivate.
//!
//! [`HOSTILE_ENVIRONMENT_THRESHOLD`]: ../../config/constant.HOSTILE_ENVIRONMENT_THRESHOLD.html

use crate::config::{HOSTILE_ENVIRONMENT_LEVEL, HOSTILE_ENVIRONMENT_THRESHOLD};
use crate::info::{Affinity, DeviceInfo, Mode};
use crate::led::{Led, LedState, Leds};
use crate::node::Outbound;
use crate::radio::AdvInterval;
use crate::wire::MeshAdv;

/// Working state of an aura pendant.
#[derive(Debug, Default)]
pub struct AuraState {
    is_active: bool,
    in_hostile_environment: bool,
    hostility_counter: u8,
}

impl AuraState {
    /// Enters aura mode: active, green lit, slow cadence.
    pub fn init(info: &DeviceInfo, out: &mut Outbound, leds: &mut impl Leds) -> AuraState {
        let state = AuraState {
            is_active: true,
            ..AuraState::default()
        };
        out.set_mesh(info, 1);
        out.set_interval(AdvInterval::Slow);
        leds.set_state(Led::Green, LedState::On);
        leds.set_state(Led::Red, LedState::Off);
        state
    }

    /// Whether the pendant is currently broadcasting as active.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Notes hostile-environment broadcasts from active opposing auras.
    pub fn on_mesh(&mut self, info: &DeviceInfo, adv: &MeshAdv) {
        if adv.info.mode != Mode::Aura || adv.state == 0 {
            return;
        }
        if adv.info.level == HOSTILE_ENVIRONMENT_LEVEL
            && adv.info.affinity != info.affinity
            && info.affinity != Affinity::Unity
        {
            self.in_hostile_environment = true;
        }
    }

    pub fn end_of_cycle(&mut self, info: &DeviceInfo, out: &mut Outbound, leds: &mut impl Leds) {
        if self.in_hostile_environment {
            if self.hostility_counter < HOSTILE_ENVIRONMENT_THRESHOLD {
                self.hostility_counter += 1;
                leds.set_state(Led::Green, LedState::from(self.is_active));
                leds.set_state(
                    Led::Red,
                    if self.is_active {
                        LedState::BlinkOnce
                    } else {
                        LedState::On
                    },
                );
            }
            if self.hostility_counter >= HOSTILE_ENVIRONMENT_THRESHOLD {
                leds.set_state(Led::Green, LedState::Off);
                leds.set_state(Led::Red, LedState::On);
                if self.is_active {
                    info!(
                        "surrounded for {} cycles, deactivating",
                        self.hostility_counter
                    );
                }
                self.is_active = false;
                out.set_mesh(info, 0);
            }
            // consumed; the next cycle has to prove hostility again
            self.in_hostile_environment = false;
        } else if self.hostility_counter > 0 {
            self.hostility_counter -= 1;
            if self.hostility_counter == 0 {
                info!("surroundings clear, reactivating");
                leds.set_state(Led::Green, LedState::On);
                leds.set_state(Led::Red, LedState::Off);
                self.is_active = true;
                out.set_mesh(info, 1);
            } else {
                leds.set_state(Led::Green, LedState::BlinkOnce);
                leds.set_state(Led::Red, LedState::On);
            }
        }
    }
}

#![no_std]
#![no_main]

mod bus;
mod radio;

use core::time::Duration;

use bleps::{Ble, HciConnector};
use climate_shared::{BusConfig, DutyCycle, NodeConfig, Sleeper};
use defmt_rtt as _;
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    entry,
    peripherals::LPWR,
    rng::Rng,
    rtc_cntl::{sleep::TimerWakeupSource, Rtc},
    timer::timg::TimerGroup,
};
use esp_wifi::ble::controller::BleConnector;

use crate::bus::EspBus;
use crate::radio::BleRadio;

/// Board wiring: BME280 on GPIO6 (SDA) / GPIO7 (SCL).
const CONFIG: NodeConfig = NodeConfig::new(BusConfig::new(6, 7));

struct RtcSleep {
    rtc: Rtc<'static>,
}

impl RtcSleep {
    fn new(lpwr: LPWR) -> Self {
        Self { rtc: Rtc::new(lpwr) }
    }
}

impl Sleeper for RtcSleep {
    fn deep_sleep(&mut self, duration: Duration) -> ! {
        let timer = TimerWakeupSource::new(duration);
        self.rtc.sleep_deep(&[&timer])
    }
}

fn now() -> u64 {
    esp_hal::time::now().duration_since_epoch().to_millis()
}

#[entry]
fn main() -> ! {
    esp_alloc::heap_allocator!(72 * 1024);
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let mut sleeper = RtcSleep::new(peripherals.LPWR);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let controller = esp_wifi::init(timg0.timer0, Rng::new(peripherals.RNG), peripherals.RADIO_CLK)
        .map_err(|e| defmt::error!("esp-wifi init: {:?}", e))
        .ok();
    let hci = controller
        .as_ref()
        .map(|init| HciConnector::new(BleConnector::new(init, peripherals.BT), now));
    let radio = BleRadio::new(hci.as_ref().map(|hci| Ble::new(hci)));

    let bus = EspBus::new(peripherals.I2C0, peripherals.GPIO6, peripherals.GPIO7);

    match DutyCycle::new(CONFIG, bus, radio, Delay::new()) {
        Ok(cycle) => cycle.run(&mut sleeper),
        Err(e) => {
            defmt::error!("invalid configuration: {:?}", e);
            sleeper.deep_sleep(CONFIG.sleep_duration())
        }
    }
}

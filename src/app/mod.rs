mod net;
mod server;

use esp_hal::{
    gpio::{Level, Output, OutputConfig},
    timer::timg::TimerGroup,
};
use esp_storage::FlashStorage;
use log::{error, info};
use smart_led::{config, BootCredentials, CredentialStore};

const HEAP_BYTES: usize = 72 * 1024;

pub(crate) fn run() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: HEAP_BYTES);
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let flash = FlashStorage::new(peripherals.FLASH).multicore_auto_park();
    let mut store = CredentialStore::new(flash);
    let stored = store.load();
    if stored.is_some() {
        info!("cred_store: found credentials in flash");
    }

    let runtime = match net::setup(peripherals.WIFI) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("{}", err);
            halt_forever();
        }
    };
    let policy = config::SessionPolicy::from_build_env();
    let credentials = BootCredentials::new(stored, config::compiled_wifi_credentials());

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(net::net_task(runtime.net_runner));
        spawner.must_spawn(net::wifi_task(runtime.wifi_controller, credentials, store));
        spawner.must_spawn(server::server_task(runtime.stack, led, policy));
    });
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

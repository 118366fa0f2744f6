use embassy_net::{Runner, Stack, StackResources};
use embassy_time::{with_timeout, Duration, Timer};
use esp_hal::rng::Rng;
use esp_radio::wifi::{
    AuthMethod, ClientConfig, Config as WifiRuntimeConfig, InternalWifiError, ModeConfig,
    WifiController, WifiDevice, WifiError, WifiEvent,
};
use esp_storage::FlashStorage;
use log::{info, warn};
use smart_led::{
    config::WIFI_CONNECT_TIMEOUT_MS, BootCredentials, CredentialRecord, CredentialStore,
};
use static_cell::StaticCell;

const WIFI_RX_QUEUE_SIZE: usize = 3;
const WIFI_TX_QUEUE_SIZE: usize = 2;
const RETRY_BACKOFF_MIN_MS: u64 = 2_000;
const RETRY_BACKOFF_MAX_MS: u64 = 30_000;

pub(super) type FlashStore = CredentialStore<FlashStorage<'static>>;

pub(super) struct NetRuntime {
    pub(super) wifi_controller: WifiController<'static>,
    pub(super) net_runner: Runner<'static, WifiDevice<'static>>,
    pub(super) stack: Stack<'static>,
}

pub(super) fn setup(wifi: esp_hal::peripherals::WIFI<'static>) -> Result<NetRuntime, &'static str> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

    let radio_ctrl = esp_radio::init().map_err(|err| {
        log::error!("wifi: esp_radio::init err={:?}", err);
        "wifi: esp_radio::init failed"
    })?;
    let radio_ctrl = RADIO_CTRL.init(radio_ctrl);
    let runtime_config = WifiRuntimeConfig::default()
        .with_rx_queue_size(WIFI_RX_QUEUE_SIZE)
        .with_tx_queue_size(WIFI_TX_QUEUE_SIZE);
    let (wifi_controller, ifaces) = esp_radio::wifi::new(radio_ctrl, wifi, runtime_config)
        .map_err(|err| match err {
            WifiError::InvalidArguments => "wifi: init failed invalid_args",
            WifiError::Unsupported => "wifi: init failed unsupported",
            WifiError::NotInitialized => "wifi: init failed not_initialized",
            WifiError::InternalError(InternalWifiError::NoMem) => "wifi: init failed no_mem",
            _ => "wifi: init failed other",
        })?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, net_runner) = embassy_net::new(
        ifaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );

    Ok(NetRuntime {
        wifi_controller,
        net_runner,
        stack,
    })
}

#[embassy_executor::task]
pub(super) async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Associates with the first candidate that works and reassociates after
/// every disconnect. Only the first association of a boot may write flash.
#[embassy_executor::task]
pub(super) async fn wifi_task(
    mut controller: WifiController<'static>,
    credentials: BootCredentials,
    mut store: FlashStore,
) {
    if credentials.is_empty() {
        warn!("wifi: no credentials stored or compiled in; staying offline");
        return;
    }

    let mut first_association = true;
    let mut backoff_ms = RETRY_BACKOFF_MIN_MS;

    loop {
        let mut connected = None;
        for candidate in credentials.candidates().into_iter().flatten() {
            if connect(&mut controller, &candidate).await {
                connected = Some(candidate);
                break;
            }
        }

        let Some(candidate) = connected else {
            Timer::after(Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(RETRY_BACKOFF_MAX_MS);
            continue;
        };
        backoff_ms = RETRY_BACKOFF_MIN_MS;

        if first_association {
            first_association = false;
            if let Some(record) = credentials.to_persist(&candidate) {
                store.save(&record);
            }
        }

        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("wifi: disconnected");
    }
}

async fn connect(controller: &mut WifiController<'static>, credentials: &CredentialRecord) -> bool {
    let Some(mode) = mode_config(credentials) else {
        warn!("wifi: credentials are not valid utf-8");
        return false;
    };
    if matches!(controller.is_started(), Ok(true)) {
        let _ = controller.stop_async().await;
    }
    if let Err(err) = controller.set_config(&mode) {
        warn!("wifi: station config err={:?}", err);
        return false;
    }
    if let Err(err) = controller.start_async().await {
        warn!("wifi: start err={:?}", err);
        return false;
    }

    info!(
        "wifi: connecting ssid={}",
        credentials.ssid_str().unwrap_or_default()
    );
    let attempt = with_timeout(
        Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS),
        controller.connect_async(),
    )
    .await;
    match attempt {
        Ok(Ok(())) => {
            info!("wifi: connected");
            true
        }
        Ok(Err(err)) => {
            warn!("wifi: connect err={:?}", err);
            let _ = controller.disconnect_async().await;
            false
        }
        Err(_) => {
            warn!("wifi: connect timed out after {} ms", WIFI_CONNECT_TIMEOUT_MS);
            let _ = controller.disconnect_async().await;
            false
        }
    }
}

fn mode_config(credentials: &CredentialRecord) -> Option<ModeConfig> {
    let ssid = credentials.ssid_str()?;
    let password = credentials.password_str()?;
    let auth_method = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::Wpa2Personal
    };
    let client = ClientConfig::default()
        .with_ssid(ssid.into())
        .with_password(password.into())
        .with_auth_method(auth_method);
    Some(ModeConfig::Client(client))
}

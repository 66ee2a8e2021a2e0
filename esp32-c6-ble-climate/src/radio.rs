use bleps::{
    hci::{
        advertising::{AdvertisingParameters, AdvertisingType, OwnAddressType, PeerAddressType},
        BdAddr,
    },
    Ble, Data,
};
use climate_shared::radio::{AdvertisingKind, OwnAddress};
use climate_shared::{AdvertisingParams, Radio, RadioError};

/// bleps host on top of the esp-wifi BLE controller.
///
/// `None` when the controller failed to come up at boot; every cycle then
/// fails at `start`.
pub struct BleRadio<'d> {
    ble: Option<Ble<'d>>,
}

impl<'d> BleRadio<'d> {
    pub fn new(ble: Option<Ble<'d>>) -> Self {
        Self { ble }
    }

    fn ble(&mut self) -> Result<&mut Ble<'d>, RadioError> {
        self.ble.as_mut().ok_or(RadioError::ControllerInit)
    }
}

impl Radio for BleRadio<'_> {
    fn start(&mut self) -> Result<(), RadioError> {
        self.ble()?.init().map_err(|e| {
            defmt::error!("hci reset: {:?}", e);
            RadioError::ControllerInit
        })?;
        Ok(())
    }

    fn set_advertisement_data(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.ble()?
            .cmd_set_le_advertising_data(Data::new(data))
            .map_err(|_| RadioError::AdvertisingData)?;
        Ok(())
    }

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), RadioError> {
        let ble = self.ble()?;
        ble.cmd_set_le_advertising_parameters_custom(&hci_parameters(params))
            .map_err(|_| RadioError::AdvertisingParameters)?;
        ble.cmd_set_le_advertise_enable(true)
            .map_err(|_| RadioError::StartAdvertising)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        self.ble()?
            .cmd_set_le_advertise_enable(false)
            .map_err(|_| RadioError::Shutdown)?;
        Ok(())
    }
}

fn hci_parameters(params: &AdvertisingParams) -> AdvertisingParameters {
    AdvertisingParameters {
        advertising_interval_min: params.interval_min,
        advertising_interval_max: params.interval_max,
        advertising_type: match params.kind {
            AdvertisingKind::ConnectableUndirected => AdvertisingType::AdvInd,
            AdvertisingKind::ScannableUndirected => AdvertisingType::AdvScanInd,
            AdvertisingKind::NonConnectable => AdvertisingType::AdvNonConnInd,
        },
        own_address_type: match params.own_address {
            OwnAddress::Public => OwnAddressType::Public,
            OwnAddress::Random => OwnAddressType::Random,
        },
        peer_address_type: PeerAddressType::Public,
        peer_address: BdAddr([0; 6]),
        advertising_channel_map: params.channel_map,
        filter_policy: Default::default(),
    }
}

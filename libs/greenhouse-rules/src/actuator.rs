//! Physical actuator writes

use greenhouse_model::{Device, Greenhouse};
use greenhouse_modbus::{CoilState, Endpoint, FieldBus, ModbusError, ValveAngle};
use tracing::debug;

pub fn endpoint_of(greenhouse: &Greenhouse) -> Endpoint {
    Endpoint::new(greenhouse.address.clone(), greenhouse.port)
}

/// Push the device's current `is_on` to the field
///
/// Lights are a coil; doors and vents are a register angle of 0 or 90.
pub async fn drive_actuator(
    bus: &dyn FieldBus,
    greenhouse: &Greenhouse,
    device: &Device,
) -> Result<(), ModbusError> {
    let endpoint = endpoint_of(greenhouse);
    if device.kind.uses_coil() {
        let state = CoilState::from(device.is_on);
        debug!("{} coil {} -> {}", endpoint, device.register, state);
        bus.write_coil(&endpoint, device.register, state).await
    } else {
        let angle = ValveAngle::from_open(device.is_on);
        debug!("{} register {} -> {}", endpoint, device.register, angle);
        bus.write_angle(&endpoint, device.register, angle).await
    }
}

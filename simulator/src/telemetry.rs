use monitord::model::Location;
use rand::Rng;
use std::collections::HashMap;

/// Random walk state of one simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: u64,
    pub location: Location,
    pub battery: u32,
}

impl SimulatedDevice {
    pub fn new(id: u64, rng: &mut impl Rng) -> Self {
        Self {
            id,
            location: Location {
                latitude: rng.gen_range(-60.0..60.0),
                longitude: rng.gen_range(-180.0..180.0),
                altitude: rng.gen_range(0.0..500.0),
            },
            battery: 100,
        }
    }

    /// Moves the device a little and drains its battery, recharging at zero.
    pub fn step(&mut self, rng: &mut impl Rng) {
        self.location.latitude =
            (self.location.latitude + rng.gen_range(-0.01f32..0.01)).clamp(-90.0, 90.0);
        self.location.longitude += rng.gen_range(-0.01f32..0.01);
        self.location.altitude = (self.location.altitude + rng.gen_range(-5.0f32..5.0)).max(0.0);

        if rng.gen_bool(0.1) {
            self.battery = self.battery.saturating_sub(1);
        }
        if self.battery == 0 {
            self.battery = 100;
        }
    }
}

pub fn generate_readings(rng: &mut impl Rng) -> HashMap<String, f32> {
    let temperature: f32 = if rng.gen_bool(0.05) {
        rng.gen_range(-50.0..100.0) // 5% outliers
    } else {
        rng.gen_range(15.0..35.0)
    };

    let mut readings = HashMap::from([
        ("temp".to_string(), temperature),
        ("humidity".to_string(), rng.gen_range(30.0..80.0)),
    ]);
    if rng.gen_bool(0.2) {
        readings.insert("wind_speed".to_string(), rng.gen_range(0.0..25.0));
    }
    readings
}

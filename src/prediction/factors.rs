//! Rule-based adjustment factor.
//!
//! Every rule adds to (or subtracts from) a base factor of 1.0. The result is
//! multiplied onto the historical baseline and never drops below
//! [`FACTOR_FLOOR`].

use crate::state::WeatherSignal;

pub const BASE_FACTOR: f64 = 1.0;
pub const FACTOR_FLOOR: f64 = 0.5;

pub const MORNING_BONUS: f64 = 0.3;
pub const MIDDAY_BONUS: f64 = 0.2;
pub const NIGHT_PENALTY: f64 = -0.8;
pub const COLD_WATER_PENALTY: f64 = -0.2;
pub const WARM_AIR_BONUS: f64 = 0.2;
pub const COLD_AIR_PENALTY: f64 = -0.3;
pub const RAIN_PENALTY: f64 = -0.3;
pub const LOW_LEVEL_PENALTY: f64 = -0.3;
pub const HIGH_LEVEL_BONUS: f64 = 0.2;

pub const COLD_WATER_BELOW: f64 = 10.0;
pub const WARM_AIR_ABOVE: f64 = 20.0;
pub const COLD_AIR_BELOW: f64 = 5.0;
pub const LOW_LEVEL_BELOW: f64 = 140.0;
pub const HIGH_LEVEL_ABOVE: f64 = 145.0;

/// Rain-class weather condition codes.
pub const RAIN_CONDITIONS: [i32; 2] = [61, 71];

pub fn time_of_day_adjustment(hour: u8) -> f64 {
    match hour {
        6..=8 => MORNING_BONUS,
        12..=14 => MIDDAY_BONUS,
        22.. | 0..=5 => NIGHT_PENALTY,
        _ => 0.0,
    }
}

pub fn water_temperature_adjustment(water_temp: Option<f64>) -> f64 {
    match water_temp {
        Some(temp) if temp < COLD_WATER_BELOW => COLD_WATER_PENALTY,
        _ => 0.0,
    }
}

/// A reading of exactly 0.0 counts as "no signal". Upstream weather feeds
/// report missing air temperature as zero, so a genuine 0 degree reading
/// gets no cold-air penalty here.
pub fn air_temperature_adjustment(air_temp: Option<f64>) -> f64 {
    match air_temp {
        Some(temp) if temp == 0.0 => 0.0,
        Some(temp) if temp > WARM_AIR_ABOVE => WARM_AIR_BONUS,
        Some(temp) if temp < COLD_AIR_BELOW => COLD_AIR_PENALTY,
        _ => 0.0,
    }
}

pub fn weather_condition_adjustment(condition: i32) -> f64 {
    if RAIN_CONDITIONS.contains(&condition) {
        RAIN_PENALTY
    } else {
        0.0
    }
}

pub fn water_level_adjustment(water_level: f64) -> f64 {
    if water_level < LOW_LEVEL_BELOW {
        LOW_LEVEL_PENALTY
    } else if water_level > HIGH_LEVEL_ABOVE {
        HIGH_LEVEL_BONUS
    } else {
        0.0
    }
}

pub fn calculate_factor(
    hour: u8,
    water_temp: Option<f64>,
    weather: WeatherSignal,
    water_level: f64,
    _water_flow: f64,
) -> f64 {
    let factor = BASE_FACTOR
        + time_of_day_adjustment(hour)
        + water_temperature_adjustment(water_temp)
        + air_temperature_adjustment(weather.temperature)
        + weather_condition_adjustment(weather.condition)
        + water_level_adjustment(water_level);

    factor.max(FACTOR_FLOOR)
}

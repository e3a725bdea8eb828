use serde::Serialize;

/// One synchronous reading from the BME280-class ambient sensor.
#[derive(Debug, Clone, Copy)]
pub struct AmbientSample {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Telemetry payload sent to the remote endpoint.
///
/// Field names and units are the wire contract with existing consumers:
/// temperature in °C, humidity in %, pressure in hPa, pm10/pm25 in µg/m³.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TelemetryReport {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub pm10: f64,
    pub pm25: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_with_exact_field_names() {
        let report = TelemetryReport {
            temperature: 21.5,
            humidity: 40.0,
            pressure: 1013.25,
            pm10: 5.0,
            pm25: 2.5,
        };

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["temperature"], 21.5);
        assert_eq!(json["humidity"], 40.0);
        assert_eq!(json["pressure"], 1013.25);
        assert_eq!(json["pm10"], 5.0);
        assert_eq!(json["pm25"], 2.5);
    }
}

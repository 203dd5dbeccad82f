//! BME680 climate sensor driver (I²C, forced mode).
//!
//! Generic over the `embedded-hal` 1.0 [`I2c`] and [`DelayNs`] traits so
//! the same code runs on the ESP-IDF `I2cDriver` and on a fake bus in tests.
//! Compensation uses the Bosch floating-point formulas.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::error::{InitError, SensorError};
use crate::sensors::climate::{ClimateDriver, ClimateSample, ClimateSetup, Oversampling};

const REG_CHIP_ID: u8 = 0xD0;
const CHIP_ID: u8 = 0x61;
const REG_SOFT_RESET: u8 = 0xE0;
const SOFT_RESET_CMD: u8 = 0xB6;

const REG_RES_HEAT_VAL: u8 = 0x00;
const REG_RES_HEAT_RANGE: u8 = 0x02;
const REG_RANGE_SW_ERR: u8 = 0x04;
const REG_FIELD0: u8 = 0x1D;
const REG_RES_HEAT_0: u8 = 0x5A;
const REG_GAS_WAIT_0: u8 = 0x64;
const REG_CTRL_GAS_1: u8 = 0x71;
const REG_CTRL_HUM: u8 = 0x72;
const REG_CTRL_MEAS: u8 = 0x74;
const REG_CONFIG: u8 = 0x75;
const REG_COEFF1: u8 = 0x89;
const REG_COEFF2: u8 = 0xE1;

const COEFF1_LEN: usize = 25;
const COEFF2_LEN: usize = 16;
const FIELD_LEN: usize = 15;

const MODE_FORCED: u8 = 0x01;
const RUN_GAS: u8 = 0x10;
const NEW_DATA: u8 = 0x80;
const GAS_VALID: u8 = 0x20;
const HEAT_STAB: u8 = 0x10;

/// Ambient temperature assumed when computing the heater set-point.
const AMBIENT_C: f32 = 25.0;
const POLL_ATTEMPTS: u8 = 10;
const POLL_INTERVAL_MS: u32 = 10;

const GAS_RANGE_K1: [f32; 16] = [
    0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, -0.8, 0.0, 0.0, -0.2, -0.5, 0.0, -1.0, 0.0, 0.0,
];
const GAS_RANGE_K2: [f32; 16] = [
    0.0, 0.0, 0.0, 0.0, 0.1, 0.7, 0.0, -0.8, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

// ---------------------------------------------------------------------------
// Factory calibration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Calibration {
    t1: f32,
    t2: f32,
    t3: f32,
    p1: f32,
    p2: f32,
    p3: f32,
    p4: f32,
    p5: f32,
    p6: f32,
    p7: f32,
    p8: f32,
    p9: f32,
    p10: f32,
    h1: f32,
    h2: f32,
    h3: f32,
    h4: f32,
    h5: f32,
    h6: f32,
    h7: f32,
    gh1: f32,
    gh2: f32,
    gh3: f32,
    res_heat_range: u8,
    res_heat_val: f32,
    range_sw_err: f32,
}

fn u16_at(c: &[u8], msb: usize, lsb: usize) -> f32 {
    f32::from(u16::from_be_bytes([c[msb], c[lsb]]))
}

fn i16_at(c: &[u8], msb: usize, lsb: usize) -> f32 {
    f32::from(i16::from_be_bytes([c[msb], c[lsb]]))
}

fn i8_at(c: &[u8], idx: usize) -> f32 {
    f32::from(c[idx] as i8)
}

impl Calibration {
    fn parse(c: &[u8; COEFF1_LEN + COEFF2_LEN], heat_range: u8, heat_val: u8, sw_err: u8) -> Self {
        Self {
            t1: u16_at(c, 34, 33),
            t2: i16_at(c, 2, 1),
            t3: i8_at(c, 3),
            p1: u16_at(c, 6, 5),
            p2: i16_at(c, 8, 7),
            p3: i8_at(c, 9),
            p4: i16_at(c, 12, 11),
            p5: i16_at(c, 14, 13),
            p6: i8_at(c, 16),
            p7: i8_at(c, 15),
            p8: i16_at(c, 20, 19),
            p9: i16_at(c, 22, 21),
            p10: f32::from(c[23]),
            h1: f32::from((u16::from(c[27]) << 4) | u16::from(c[26] & 0x0F)),
            h2: f32::from((u16::from(c[25]) << 4) | u16::from(c[26] >> 4)),
            h3: i8_at(c, 28),
            h4: i8_at(c, 29),
            h5: i8_at(c, 30),
            h6: f32::from(c[31]),
            h7: i8_at(c, 32),
            gh1: i8_at(c, 37),
            gh2: i16_at(c, 36, 35),
            gh3: i8_at(c, 38),
            res_heat_range: (heat_range & 0x30) >> 4,
            res_heat_val: f32::from(heat_val as i8),
            range_sw_err: f32::from((sw_err as i8) >> 4),
        }
    }

    /// Returns `(temperature °C, t_fine)`.
    fn temperature(&self, adc: u32) -> (f32, f32) {
        let adc = adc as f32;
        let var1 = (adc / 16384.0 - self.t1 / 1024.0) * self.t2;
        let d = adc / 131_072.0 - self.t1 / 8192.0;
        let var2 = d * d * (self.t3 * 16.0);
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    fn pressure(&self, adc: u32, t_fine: f32) -> f32 {
        let mut var1 = t_fine / 2.0 - 64_000.0;
        let mut var2 = var1 * var1 * (self.p6 / 131_072.0);
        var2 += var1 * self.p5 * 2.0;
        var2 = var2 / 4.0 + self.p4 * 65_536.0;
        var1 = ((self.p3 * var1 * var1) / 16_384.0 + self.p2 * var1) / 524_288.0;
        var1 = (1.0 + var1 / 32_768.0) * self.p1;
        if var1 == 0.0 {
            return 0.0;
        }
        let mut p = 1_048_576.0 - adc as f32;
        p = ((p - var2 / 4096.0) * 6250.0) / var1;
        let v1 = (self.p9 * p * p) / 2_147_483_648.0;
        let v2 = p * (self.p8 / 32_768.0);
        let scaled = p / 256.0;
        let v3 = scaled * scaled * scaled * (self.p10 / 131_072.0);
        p + (v1 + v2 + v3 + self.p7 * 128.0) / 16.0
    }

    fn humidity(&self, adc: u16, t_fine: f32) -> f32 {
        let temp = t_fine / 5120.0;
        let var1 = f32::from(adc) - (self.h1 * 16.0 + (self.h3 / 2.0) * temp);
        let var2 = var1
            * ((self.h2 / 262_144.0)
                * (1.0 + (self.h4 / 16_384.0) * temp + (self.h5 / 1_048_576.0) * temp * temp));
        let var3 = self.h6 / 16_384.0;
        let var4 = self.h7 / 2_097_152.0;
        (var2 + (var3 + var4 * temp) * var2 * var2).clamp(0.0, 100.0)
    }

    fn gas_resistance(&self, adc: u16, range: u8) -> f32 {
        let range = usize::from(range & 0x0F);
        let var1 = 1340.0 + 5.0 * self.range_sw_err;
        let var2 = var1 * (1.0 + GAS_RANGE_K1[range] / 100.0);
        let var3 = 1.0 + GAS_RANGE_K2[range] / 100.0;
        1.0 / (var3 * 0.000_000_125 * (1u32 << range) as f32 * ((f32::from(adc) - 512.0) / var2 + 1.0))
    }

    /// Heater resistance register value for a target plate temperature.
    fn heater_resistance(&self, target_c: u16) -> u8 {
        let target = f32::from(target_c.min(400));
        let var1 = self.gh1 / 16.0 + 49.0;
        let var2 = (self.gh2 / 32_768.0) * 0.0005 + 0.002_35;
        let var3 = self.gh3 / 1024.0;
        let var4 = var1 * (1.0 + var2 * target);
        let var5 = var4 + var3 * AMBIENT_C;
        let range = f32::from(self.res_heat_range);
        let res = 3.4
            * (var5 * (4.0 / (4.0 + range)) * (1.0 / (1.0 + self.res_heat_val * 0.002)) - 25.0);
        res.clamp(0.0, 255.0) as u8
    }
}

/// Encode a heater duration into the `gas_wait_x` register format:
/// a 6-bit base in 1 ms units and a 2-bit multiplier of 1, 4, 16 or 64.
/// Anything past 63 × 64 ms saturates at `0xFF`.
pub fn heater_duration_code(duration_ms: u16) -> u8 {
    let mut dur = duration_ms;
    let mut factor: u8 = 0;
    while dur > 0x3F {
        if factor == 3 {
            return 0xFF;
        }
        dur /= 4;
        factor += 1;
    }
    (factor << 6) | dur as u8
}

fn oversampling_cycles(os: Oversampling) -> u32 {
    match os {
        Oversampling::Skip => 0,
        Oversampling::X1 => 1,
        Oversampling::X2 => 2,
        Oversampling::X4 => 4,
        Oversampling::X8 => 8,
        Oversampling::X16 => 16,
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct Bme680<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calib: Calibration,
    setup: ClimateSetup,
}

impl<I2C: I2c, D: DelayNs> Bme680<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            calib: Calibration::default(),
            setup: ClimateSetup::default(),
        }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.address, &[reg], buf)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut b = [0u8; 1];
        self.read_regs(reg, &mut b)?;
        Ok(b[0])
    }

    fn load_calibration(&mut self) -> Result<(), I2C::Error> {
        let mut coeff = [0u8; COEFF1_LEN + COEFF2_LEN];
        self.read_regs(REG_COEFF1, &mut coeff[..COEFF1_LEN])?;
        self.read_regs(REG_COEFF2, &mut coeff[COEFF1_LEN..])?;
        let heat_range = self.read_reg(REG_RES_HEAT_RANGE)?;
        let heat_val = self.read_reg(REG_RES_HEAT_VAL)?;
        let sw_err = self.read_reg(REG_RANGE_SW_ERR)?;
        self.calib = Calibration::parse(&coeff, heat_range, heat_val, sw_err);
        Ok(())
    }

    /// Expected TPHG conversion time plus heater time (ms).
    fn profile_duration_ms(&self) -> u32 {
        let cycles = oversampling_cycles(self.setup.temperature_os)
            + oversampling_cycles(self.setup.pressure_os)
            + oversampling_cycles(self.setup.humidity_os);
        let tph_us = cycles * 1963 + 477 * 4 + 477 * 5 + 500;
        tph_us / 1000 + 1 + u32::from(self.setup.heater.duration_ms)
    }

    fn ctrl_meas(&self, mode: u8) -> u8 {
        (self.setup.temperature_os.code() << 5) | (self.setup.pressure_os.code() << 2) | mode
    }
}

impl<I2C: I2c, D: DelayNs> ClimateDriver for Bme680<I2C, D> {
    fn begin(&mut self) -> Result<(), InitError> {
        let id = self
            .read_reg(REG_CHIP_ID)
            .map_err(|_| InitError::ClimateNotFound)?;
        if id != CHIP_ID {
            debug!("bme680: unexpected chip id 0x{:02x}", id);
            return Err(InitError::ClimateNotFound);
        }
        self.write_reg(REG_SOFT_RESET, SOFT_RESET_CMD)
            .map_err(|_| InitError::ClimateNotFound)?;
        self.delay.delay_ms(10);
        self.load_calibration()
            .map_err(|_| InitError::ClimateNotFound)?;
        info!("bme680: found at 0x{:02x}", self.address);
        Ok(())
    }

    fn configure(&mut self, setup: &ClimateSetup) -> Result<(), InitError> {
        self.setup = *setup;
        let res_heat = self.calib.heater_resistance(setup.heater.temperature_c);
        let gas_wait = heater_duration_code(setup.heater.duration_ms);
        let writes = [
            (REG_CTRL_HUM, setup.humidity_os.code()),
            (REG_CONFIG, setup.filter.code() << 2),
            (REG_CTRL_MEAS, self.ctrl_meas(0)),
            (REG_RES_HEAT_0, res_heat),
            (REG_GAS_WAIT_0, gas_wait),
            (REG_CTRL_GAS_1, RUN_GAS),
        ];
        for (reg, value) in writes {
            self.write_reg(reg, value)
                .map_err(|_| InitError::ClimateConfigFailed)?;
        }
        Ok(())
    }

    fn perform_reading(&mut self) -> Result<ClimateSample, SensorError> {
        let trigger = self.ctrl_meas(MODE_FORCED);
        self.write_reg(REG_CTRL_MEAS, trigger)
            .map_err(|_| SensorError::BusError)?;
        self.delay.delay_ms(self.profile_duration_ms());

        let mut field = [0u8; FIELD_LEN];
        let mut ready = false;
        for _ in 0..POLL_ATTEMPTS {
            self.read_regs(REG_FIELD0, &mut field)
                .map_err(|_| SensorError::BusError)?;
            if field[0] & NEW_DATA != 0 {
                ready = true;
                break;
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
        if !ready {
            return Err(SensorError::Timeout);
        }

        let press_adc =
            (u32::from(field[2]) << 12) | (u32::from(field[3]) << 4) | (u32::from(field[4]) >> 4);
        let temp_adc =
            (u32::from(field[5]) << 12) | (u32::from(field[6]) << 4) | (u32::from(field[7]) >> 4);
        let hum_adc = u16::from_be_bytes([field[8], field[9]]);
        let gas_adc = (u16::from(field[13]) << 2) | u16::from(field[14] >> 6);
        let gas_range = field[14] & 0x0F;

        let (temperature_c, t_fine) = self.calib.temperature(temp_adc);
        let gas_resistance_ohm = if field[14] & (GAS_VALID | HEAT_STAB) == GAS_VALID | HEAT_STAB {
            self.calib.gas_resistance(gas_adc, gas_range)
        } else {
            0.0
        };

        Ok(ClimateSample {
            temperature_c,
            humidity_pct: self.calib.humidity(hum_adc, t_fine),
            pressure_pa: self.calib.pressure(press_adc, t_fine),
            gas_resistance_ohm,
        })
    }
}

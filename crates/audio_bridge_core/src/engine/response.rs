//! Frequency response of the reference engine's filters.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSettings<'a> {
    pub filter_type: &'a str,
    pub frequency: f64,
    pub detune: f64,
    pub q: f64,
    pub gain: f64,
}

/// Audio EQ cookbook coefficients, with the Q interpretation each filter
/// type uses on the web platform.
pub fn biquad_coefficients(settings: &BiquadSettings<'_>, sample_rate: f64) -> BiquadCoefficients {
    let nyquist = sample_rate / 2.0;
    let f0 = (settings.frequency * 2f64.powf(settings.detune / 1200.0)).clamp(0.0, nyquist);
    let w0 = 2.0 * PI * f0 / sample_rate;
    let (sin, cos) = w0.sin_cos();

    let a = 10f64.powf(settings.gain / 40.0);
    let alpha_q = sin / (2.0 * settings.q);
    let alpha_q_db = sin / (2.0 * 10f64.powf(settings.q / 20.0));
    let alpha_s = sin / 2.0 * 2f64.sqrt();
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha_s;

    let (b0, b1, b2, a0, a1, a2) = match settings.filter_type {
        "highpass" => (
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha_q_db,
            -2.0 * cos,
            1.0 - alpha_q_db,
        ),
        "bandpass" => (
            alpha_q,
            0.0,
            -alpha_q,
            1.0 + alpha_q,
            -2.0 * cos,
            1.0 - alpha_q,
        ),
        "notch" => (1.0, -2.0 * cos, 1.0, 1.0 + alpha_q, -2.0 * cos, 1.0 - alpha_q),
        "allpass" => (
            1.0 - alpha_q,
            -2.0 * cos,
            1.0 + alpha_q,
            1.0 + alpha_q,
            -2.0 * cos,
            1.0 - alpha_q,
        ),
        "peaking" => (
            1.0 + alpha_q * a,
            -2.0 * cos,
            1.0 - alpha_q * a,
            1.0 + alpha_q / a,
            -2.0 * cos,
            1.0 - alpha_q / a,
        ),
        "lowshelf" => (
            a * ((a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha,
        ),
        "highshelf" => (
            a * ((a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha,
        ),
        // lowpass
        _ => (
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha_q_db,
            -2.0 * cos,
            1.0 - alpha_q_db,
        ),
    };

    BiquadCoefficients {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    }
}

/// Evaluate `sum(b[k] z^-k) / sum(a[k] z^-k)` on the unit circle for every
/// frequency. Frequencies outside `[0, nyquist]` report NaN.
pub fn transfer_response(
    numerator: &[f64],
    denominator: &[f64],
    sample_rate: f64,
    frequency_hz: &[f32],
    mag_response: &mut [f32],
    phase_response: &mut [f32],
) {
    let nyquist = sample_rate / 2.0;

    for (i, f) in frequency_hz.iter().enumerate() {
        let f = *f as f64;
        if !(0.0..=nyquist).contains(&f) {
            mag_response[i] = f32::NAN;
            phase_response[i] = f32::NAN;
            continue;
        }

        let omega = PI * f / nyquist;
        let z_inv = Complex64::from_polar(1.0, -omega);
        let h = polynomial(numerator, z_inv) / polynomial(denominator, z_inv);

        mag_response[i] = h.norm() as f32;
        phase_response[i] = h.arg() as f32;
    }
}

fn polynomial(coefficients: &[f64], z_inv: Complex64) -> Complex64 {
    // Horner in z^-1
    coefficients
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, c| acc * z_inv + *c)
}

pub fn biquad_response(
    coefficients: &BiquadCoefficients,
    sample_rate: f64,
    frequency_hz: &[f32],
    mag_response: &mut [f32],
    phase_response: &mut [f32],
) {
    let c = coefficients;
    transfer_response(
        &[c.b0, c.b1, c.b2],
        &[1.0, c.a1, c.a2],
        sample_rate,
        frequency_hz,
        mag_response,
        phase_response,
    );
}

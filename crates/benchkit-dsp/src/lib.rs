//! Benchkit DSP - numeric primitives for amplifier bench measurements
//!
//! This crate provides the math the sweep drivers consume:
//!
//! - [`levels`] - Vrms / Vpp level measurement on captured waveforms
//! - [`thd`] - windowed-FFT Total Harmonic Distortion estimation
//! - [`points`] - log/linear sweep frequency point generation
//! - [`knees`] - -dB bandwidth knee detection on amplitude-vs-frequency data
//!
//! Everything here is pure: no instrument I/O, no logging, no files. The
//! sweep orchestration in `benchkit-sweep` owns all of that.
//!
//! ## Example
//!
//! ```rust,ignore
//! use benchkit_dsp::{thd_fft, vpp, vrms, Window};
//!
//! let (times, volts) = capture();
//! let level = vrms(&volts);
//! let swing = vpp(&volts);
//! let thd = thd_fft(&times, &volts, 1000.0, 10, Window::Hann);
//! ```

pub mod knees;
pub mod levels;
pub mod points;
pub mod thd;

pub use knees::{KneeResult, RefMode, find_knees, reference_index};
pub use levels::{db_from_amplitude, vpp, vrms};
pub use points::{PointSpacing, build_freq_points};
pub use thd::{Window, thd_fft};

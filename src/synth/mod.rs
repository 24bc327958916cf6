// Module synthèse - Voix de batterie et blocs DSP de la chaîne de mixage

pub mod delay;
pub mod distortion;
pub mod dynamics;
pub mod envelope;
pub mod filter;
pub mod noise;
pub mod oscillator;
pub mod reverb;
pub mod voice;

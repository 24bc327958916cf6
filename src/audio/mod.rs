// Module audio - Gestion du backend CPAL, rendu temps-réel et export

pub mod buffer;
pub mod context;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod parameters;
pub mod render;
pub mod timing;
pub mod wav;

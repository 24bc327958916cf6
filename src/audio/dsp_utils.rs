// Utilitaires DSP - Hygiène audio et smoothing
//
// Ce module contient les fonctions partagées par toute la chaîne de
// traitement: anti-dénormaux, conversions dB et lissage des paramètres.

/// Time constant used for every parameter smoother in the mixer graph.
pub const PARAM_SMOOTHING_MS: f32 = 10.0;

/// Flush denormals to zero (anti-dénormaux)
///
/// Les nombres dénormaux (très proches de 0) peuvent causer des ralentissements CPU
/// importants, surtout dans les boucles de feedback (delay, reverb).
///
/// Seuil: 1e-15 (largement sous le bruit numérique à 32-bit float)
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Hard clipping
///
/// Clamp strict dans [-1, 1], appliqué uniquement à la sortie device.
#[inline]
pub fn hard_clip(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}

/// Decibels to linear gain
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Linear gain to decibels, floored at -200 dB for silence
#[inline]
pub fn linear_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-10).log10()
}

/// Clamp a parameter into its domain, replacing non-finite input with `fallback`.
#[inline]
pub fn clamp_param(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Smoother 1-pole (filtre passe-bas du 1er ordre)
///
/// Smooth les changements brusques de paramètres pour éviter les clics/pops.
///
/// Formule: y[n] = y[n-1] + α * (x[n] - y[n-1])
/// avec α = 1 - e^(-1/(τ * sr)), ce qui donne ~63% de la cible après τ.
#[derive(Debug, Clone)]
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// Crée un nouveau smoother
    ///
    /// # Arguments
    /// * `initial_value` - Valeur de départ
    /// * `time_constant_ms` - Temps pour atteindre ~63% de la cible (en millisecondes)
    /// * `sample_rate` - Sample rate en Hz
    ///
    /// # Exemple
    /// ```
    /// use drumseq::audio::dsp_utils::{OnePoleSmoother, PARAM_SMOOTHING_MS};
    /// let smoother = OnePoleSmoother::new(0.5, PARAM_SMOOTHING_MS, 44100.0);
    /// assert_eq!(smoother.get(), 0.5);
    /// ```
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = time_constant_ms * 0.001 * sample_rate;
        let coefficient = if time_constant_samples > 0.0 {
            1.0 - (-1.0 / time_constant_samples).exp()
        } else {
            1.0
        };

        Self {
            current: initial_value,
            coefficient: coefficient.clamp(0.0, 1.0),
        }
    }

    /// Process un nouveau sample (next target value)
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    /// Reset à une nouvelle valeur (sans smoothing)
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    /// Obtenir la valeur courante sans la modifier
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }
}

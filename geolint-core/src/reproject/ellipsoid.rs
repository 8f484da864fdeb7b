//! Ellipsoïde WGS84 et grandeurs dérivées

/// Ellipsoïde de référence de tous les CRS du registre
pub struct WGS84;

impl WGS84 {
    /// Rayon équatorial (m)
    pub const A: f64 = 6378137.0;

    pub const F: f64 = 1.0 / 298.257223563;

    /// Excentricité au carré
    pub const E2: f64 = Self::F * (2.0 - Self::F);

    /// Seconde excentricité au carré
    pub const EP2: f64 = Self::E2 / (1.0 - Self::E2);

    /// Grande normale N(φ)
    pub fn prime_vertical_radius(lat: f64) -> f64 {
        Self::A / (1.0 - Self::E2 * lat.sin().powi(2)).sqrt()
    }

    /// Rayon de courbure du méridien ρ(φ)
    pub fn meridian_radius(lat: f64) -> f64 {
        Self::A * (1.0 - Self::E2) / (1.0 - Self::E2 * lat.sin().powi(2)).powf(1.5)
    }

    /// Longueur de l'arc de méridien depuis l'équateur
    pub fn meridian_arc(lat: f64) -> f64 {
        let e2 = Self::E2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        Self::A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
    }
}

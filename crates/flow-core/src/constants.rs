//! Constantes del motor.
//!
//! Valores por defecto de reintento de los flujos de mantenimiento:
//! tres intentos en total con una espera fija de cinco minutos.

use std::time::Duration;

/// Versión lógica del motor. Se registra en `RunInitialized` para poder
/// distinguir trazas producidas por versiones incompatibles.
pub const ENGINE_VERSION: &str = "D1.0";

/// Intentos totales por defecto (intento inicial + 2 reintentos).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Espera fija por defecto entre intentos.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// Tope para backoff exponencial cuando no se indica otro.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30 * 60);

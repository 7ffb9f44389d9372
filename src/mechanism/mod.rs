pub mod error;
pub mod noise;
pub mod perturb;
pub mod projection;

pub use error::MechanismError;
pub use noise::{GammaSphereNoise, NoiseSource};
pub use perturb::perturb;
pub use projection::{squared_distance, NearestNeighborProjector};

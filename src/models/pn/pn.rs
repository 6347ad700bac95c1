use super::semiconductor::silicon;
use crate::discretization::generator::uniform;
use crate::error::DeviceError;
use crate::models::cell::Cell;
use crate::models::design::Design;
use crate::scales::Scales;

/// Device width [cm].
pub const WIDTH: f64 = 1.0e-4;
/// Donor density of the left layer [cm^-3].
pub const DONORS: f64 = 1.0e18;
/// Acceptor density of the right layer [cm^-3].
pub const ACCEPTORS: f64 = 1.0e17;
/// Majority-carrier contact recombination velocity [cm/s].
pub const CONTACT_VELOCITY: f64 = 1.0e7;

/// The silicon n+/p junction used throughout the tests, benches and demo.
#[derive(Debug, Clone)]
pub struct PnProblem {
    pub scales: Scales,
    pub design: Design,
    pub cell: Cell,
}

/// Two-layer silicon cell on a uniform grid of `num_points` nodes.
///
/// The left half is n-type, the right half p-type. Electrons are extracted
/// at the left contact and holes at the right, both with
/// [`CONTACT_VELOCITY`]. `generation` is a uniform rate in cm^-3 s^-1.
pub fn pn_problem_def(
    num_points: usize,
    generation: f64,
    logging: bool,
) -> Result<PnProblem, DeviceError> {
    let scales = Scales::default();
    let grid = uniform(WIDTH, num_points);
    let junction = WIDTH / 2.0;

    let design = Design::new(grid)
        .add_material(&silicon(), |_| true)
        .single_pn_junction(DONORS, -ACCEPTORS, junction)
        .contacts(CONTACT_VELOCITY, 0.0, 0.0, CONTACT_VELOCITY)
        .uniform_generation(generation);
    let cell = design.to_cell(&scales)?;

    if logging {
        log::info!("--- Scaling Constants ---");
        log::info!("Potential scale (kT/q): {:.4} V", scales.energy);
        log::info!("Density scale: {:.2e} cm^-3", scales.n);
        log::info!("Length scale: {:.4e} cm", scales.length);
        log::info!("Time scale: {:.4e} s", scales.time);
        log::info!("Current density scale: {:.4e} A/cm^2", scales.current);
        log::info!(
            "Device length: {:.2} normalized units, {} nodes",
            cell.grid.length(),
            cell.len()
        );
    }

    Ok(PnProblem { scales, design, cell })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn layers_and_contacts() {
        let p = pn_problem_def(11, 1e21, false).unwrap();
        let cell = &p.cell;
        assert_eq!(cell.len(), 11);
        assert!(cell.ndop[0] > 0.0 && cell.ndop[10] < 0.0);
        assert_relative_eq!(cell.ndop[0], 0.1);
        assert_relative_eq!(cell.ndop[10], -0.01);
        assert!(cell.snl > 0.0 && cell.snr == 0.0 && cell.spl == 0.0 && cell.spr > 0.0);
        assert_relative_eq!(cell.grid.length(), WIDTH / p.scales.length, max_relative = 1e-12);
        assert!(cell.g.iter().all(|g| *g > 0.0));
    }

    #[test]
    fn single_node_grid_is_rejected() {
        assert_eq!(pn_problem_def(1, 0.0, false).unwrap_err(), DeviceError::TooFewNodes(1));
    }
}

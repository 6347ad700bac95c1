use crate::analysis::sensitivity::ParamGradient;
use crate::analysis::sweep::SweepResult;
use crate::models::cell::{Cell, Param};
use crate::physics::potentials::Potentials;
use crate::scales::{Quantity, Scales};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Column-major table writer. Shorter columns leave trailing cells empty.
pub fn write_columns<W: Write>(mut out: W, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} headers for {} columns", headers.len(), data.len()),
        ));
    }
    writeln!(out, "{}", headers.join(","))?;

    let rows = data.iter().map(Vec::len).max().unwrap_or(0);
    for i in 0..rows {
        let cells: Vec<String> = data
            .iter()
            .map(|col| col.get(i).map(|v| format!("{v:.15e}")).unwrap_or_default())
            .collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()
}

pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    write_columns(BufWriter::new(File::create(path)?), headers, data)
}

/// I-V curve in volts and A/cm^2, plus the power density in W/m^2.
pub fn write_iv_curve<P: AsRef<Path>>(
    path: P,
    sweep: &SweepResult,
    scales: &Scales,
) -> io::Result<()> {
    let v: Vec<f64> = sweep.voltages.iter().map(|&v| scales.volts(v)).collect();
    let j: Vec<f64> = sweep
        .currents
        .iter()
        .map(|&i| scales.denormalize(i, Quantity::CurrentDensity))
        .collect();
    let p: Vec<f64> = sweep.powers().iter().map(|&p| scales.power_density(p)).collect();
    write_csv(path, &["v", "j", "p"], &[v, j, p])
}

/// Band edges, quasi-Fermi levels and carrier densities along the device.
pub fn write_band_diagram<P: AsRef<Path>>(
    path: P,
    cell: &Cell,
    pot: &Potentials,
    scales: &Scales,
) -> io::Result<()> {
    let x: Vec<f64> = cell
        .grid
        .nodes
        .iter()
        .map(|&x| scales.denormalize(x, Quantity::Length))
        .collect();
    let energy =
        |values: Vec<f64>| -> Vec<f64> { values.iter().map(|&e| scales.volts(e)).collect() };
    let density = |values: Vec<f64>| -> Vec<f64> {
        values
            .iter()
            .map(|&n| scales.denormalize(n, Quantity::Density))
            .collect()
    };
    write_csv(
        path,
        &["x", "ec", "ev", "efn", "efp", "n", "p"],
        &[
            x,
            energy(pot.conduction_band(cell)),
            energy(pot.valence_band(cell)),
            energy(pot.phi_n.as_slice().to_vec()),
            energy(pot.phi_p.as_slice().to_vec()),
            density(pot.electron_density(cell)),
            density(pot.hole_density(cell)),
        ],
    )
}

/// Per-node gradients, one column per parameter, against the normalized grid.
pub fn write_gradients<P: AsRef<Path>>(
    path: P,
    cell: &Cell,
    gradients: &BTreeMap<Param, ParamGradient>,
) -> io::Result<()> {
    let mut headers = vec!["x"];
    let mut columns = vec![cell.grid.nodes.clone()];
    for (param, g) in gradients {
        if let ParamGradient::PerNode(g) = g {
            headers.push(param.name());
            columns.push(g.as_slice().to_vec());
        }
    }
    write_csv(path, &headers, &columns)
}

/// Scalar gradients as `param,value` rows.
pub fn write_scalar_gradients<P: AsRef<Path>>(
    path: P,
    gradients: &BTreeMap<Param, ParamGradient>,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "param,value")?;
    for (param, g) in gradients {
        if let ParamGradient::Scalar(g) = g {
            writeln!(file, "{},{:.15e}", param.name(), g)?;
        }
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ddpv_{}_{}", std::process::id(), name))
    }

    #[test]
    fn ragged_columns_leave_empty_cells() {
        let mut buf = Vec::new();
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0]];
        write_columns(&mut buf, &["x", "y", "z"], &data).unwrap();

        let content = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y,z");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with(','));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let err = write_columns(Vec::new(), &["x"], &[vec![1.0], vec![2.0]]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn iv_curve_is_written_in_physical_units() {
        let problem = crate::models::pn::pn::pn_problem_def(3, 0.0, false).unwrap();
        let sweep = SweepResult {
            voltages: vec![0.0, 1.0],
            currents: vec![2.0, -1.0],
            iterations: vec![3, 2],
            equilibrium: Potentials::equilibrium(DVector::zeros(3)),
            last: Potentials::equilibrium(DVector::zeros(3)),
            status: crate::analysis::sweep::SweepStatus::SignReversal,
            divergence: None,
        };
        let path = temp_path("iv.csv");
        write_iv_curve(&path, &sweep, &problem.scales).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let row: Vec<f64> = content
            .lines()
            .nth(2)
            .unwrap()
            .split(',')
            .map(|c| c.parse().unwrap())
            .collect();
        approx::assert_relative_eq!(row[0], problem.scales.energy, max_relative = 1e-12);
        assert!(row[1] < 0.0);
        fs::remove_file(path).ok();
    }

    #[test]
    fn gradients_split_by_shape() {
        let problem = crate::models::pn::pn::pn_problem_def(3, 0.0, false).unwrap();
        let mut grads = BTreeMap::new();
        grads.insert(Param::G, ParamGradient::PerNode(DVector::from_vec(vec![1.0, 2.0, 3.0])));
        grads.insert(Param::Snl, ParamGradient::Scalar(0.5));

        let per_node = temp_path("grad_nodes.csv");
        let scalar = temp_path("grad_scalar.csv");
        write_gradients(&per_node, &problem.cell, &grads).unwrap();
        write_scalar_gradients(&scalar, &grads).unwrap();

        let nodes = fs::read_to_string(&per_node).unwrap();
        assert!(nodes.starts_with("x,G\n"));
        assert_eq!(nodes.lines().count(), 4);
        let scalars = fs::read_to_string(&scalar).unwrap();
        assert_eq!(scalars.lines().nth(1), Some("Snl,5.000000000000000e-1"));

        fs::remove_file(per_node).ok();
        fs::remove_file(scalar).ok();
    }
}

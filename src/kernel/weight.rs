//! Atom weights decreasing with the distance to the reaction core.
//!
//! Diffusion weights need the heat kernel of each graph. [NodeWeighter::prepare] computes them once for a batch,
//! a graph not prepared (or renumbered since) gets its operator computed on each request.

use anyhow::anyhow;
use rayon::prelude::*;

use crate::diffusion::Diffusion;
use crate::graph::model::MolGraph;

use super::params::Weighting;

/// $\alpha^{-d}$, 0 if $\alpha \le 0$
#[cfg_attr(doc, katexit::katexit)]
pub fn exponential_weight(alpha: f64, d: u32) -> f64 {
    if alpha <= 0. {
        return 0.;
    }
    alpha.powf(-(d as f64))
}

/// $1/(1 + e^{\beta (d - 0.5)})$, a step at distance 0.5 when beta is large
#[cfg_attr(doc, katexit::katexit)]
pub fn logistic_weight(beta: f64, d: u32) -> f64 {
    1. / (1. + (beta * (d as f64 - 0.5)).exp())
}

/// Computes atom weights of graphs.
pub struct NodeWeighter {
    weighting : Weighting,
    /// heat kernels with the layout key of their graph, indexed by graph index
    diffusions : Vec<Option<(u64, Diffusion)>>,
}

impl NodeWeighter {
    pub fn new(weighting: Weighting) -> Self {
        NodeWeighter {
            weighting,
            diffusions: Vec::new(),
        }
    }

    pub fn get_weighting(&self) -> Weighting {
        self.weighting
    }

    /// computes heat kernels of graphs if weighting is by diffusion, does nothing otherwise
    pub fn prepare(&mut self, graphs: &[MolGraph]) -> anyhow::Result<()> {
        let beta = match self.weighting {
            Weighting::Diffusion { beta } => beta.abs(),
            _ => return Ok(()),
        };
        let cpu_start = cpu_time::ProcessTime::now();
        let sys_start = std::time::SystemTime::now();
        //
        let computed: Vec<(usize, u64, Diffusion)> = graphs
            .par_iter()
            .map(|g| Diffusion::new(g, beta).map(|d| (g.get_index(), g.layout_key(), d)))
            .collect::<anyhow::Result<Vec<(usize, u64, Diffusion)>>>()?;
        let size = graphs.iter().map(|g| g.get_index() + 1).max().unwrap_or(0);
        self.diffusions = (0..size).map(|_| None).collect();
        for (index, key, diffusion) in computed {
            self.diffusions[index] = Some((key, diffusion));
        }
        //
        log::info!(
            "diffusion operators computed for {} graphs, sys time(s) {:.2e} cpu time(s) {:.2e}",
            graphs.len(),
            sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
            cpu_start.elapsed().as_secs_f64()
        );
        Ok(())
    } // end of prepare

    /// weight of each atom of the graph
    pub fn node_weights(&self, graph: &MolGraph) -> anyhow::Result<Vec<f64>> {
        if !graph.has_core_distances() {
            return Err(anyhow!("graph {} : core distances not computed", graph.get_name()));
        }
        let dists = graph.get_graph().node_weights().map(|a| a.get_core_dist());
        match self.weighting {
            Weighting::Exponential { alpha } => Ok(dists.map(|d| exponential_weight(alpha, d)).collect()),
            Weighting::Logistic { beta } => Ok(dists.map(|d| logistic_weight(beta, d)).collect()),
            Weighting::Diffusion { beta } => match self.diffusions.get(graph.get_index()) {
                Some(Some((key, diffusion))) if *key == graph.layout_key() => {
                    Ok(diffusion_weights(graph, diffusion, beta < 0.))
                }
                _ => {
                    log::debug!(
                        "no prepared diffusion operator for graph {} (index {}), computing it",
                        graph.get_name(),
                        graph.get_index()
                    );
                    let diffusion = Diffusion::new(graph, beta.abs())?;
                    Ok(diffusion_weights(graph, &diffusion, beta < 0.))
                }
            },
        }
    } // end of node_weights
} // end of impl NodeWeighter

// maximal influence received from a core atom
fn diffusion_weights(graph: &MolGraph, diffusion: &Diffusion, complement: bool) -> Vec<f64> {
    let core = graph.core_distance_zero_atoms();
    (0..graph.nb_atoms())
        .map(|a| {
            let influence = core
                .iter()
                .map(|x| diffusion.value(x.index(), a))
                .fold(0., f64::max);
            if complement {
                1. - influence
            } else {
                influence
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn distance_decays() {
        log_init_test();
        //
        assert_eq!(exponential_weight(2., 0), 1.);
        assert_eq!(exponential_weight(2., 3), 0.125);
        assert_eq!(exponential_weight(0., 1), 0.);
        assert_eq!(exponential_weight(1., 7), 1.);
        assert!((logistic_weight(1., 0) - 1. / (1. + (-0.5f64).exp())).abs() < 1.0e-15);
        // a huge beta makes a step between core and the rest
        assert_eq!(logistic_weight(f64::MAX, 0), 1.);
        assert_eq!(logistic_weight(f64::MAX, 1), 0.);
    }

    #[test]
    fn diffusion_weights_with_and_without_preparation() {
        log_init_test();
        //
        let g = with_core(&["C", "O", "N"], &[(0, 1, 1), (1, 2, 0)]);
        let mut weighter = NodeWeighter::new(Weighting::Diffusion { beta: 0.5 });
        let unprepared = weighter.node_weights(&g).unwrap();
        weighter.prepare(std::slice::from_ref(&g)).unwrap();
        let w = weighter.node_weights(&g).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(unprepared, w);
        // core atoms receive more than the far atom
        assert!(w[0] > w[2] && w[1] > w[2]);
        //
        let mut complement = NodeWeighter::new(Weighting::Diffusion { beta: -0.5 });
        complement.prepare(std::slice::from_ref(&g)).unwrap();
        let wc = complement.node_weights(&g).unwrap();
        for (x, y) in w.iter().zip(wc.iter()) {
            assert!((x + y - 1.).abs() < 1.0e-12);
        }
    } // end of diffusion_weights_with_and_without_preparation

    // the operator prepared for a graph must not be used for the same graph renumbered
    #[test]
    fn renumbered_graph_gets_its_own_operator() {
        log_init_test();
        //
        let g = with_core(&["C", "O", "N", "S"], &[(0, 1, 1), (1, 2, 0), (2, 3, 0)]);
        let h = with_core(&["S", "N", "O", "C"], &[(0, 1, 0), (1, 2, 0), (2, 3, 1)]);
        assert_eq!(g.get_index(), h.get_index());
        let mut weighter = NodeWeighter::new(Weighting::Diffusion { beta: 1. });
        weighter.prepare(std::slice::from_ref(&g)).unwrap();
        let wg = weighter.node_weights(&g).unwrap();
        let wh = weighter.node_weights(&h).unwrap();
        // atom a of h is atom 3 - a of g
        for a in 0..4 {
            assert!((wh[a] - wg[3 - a]).abs() < 1.0e-12);
        }
        assert!(wg[3] < wg[0]);
    }

    #[test]
    fn core_distances_required() {
        log_init_test();
        //
        let g = chain(&["C", "O"], 1);
        let weighter = NodeWeighter::new(Weighting::Exponential { alpha: 2. });
        assert!(weighter.node_weights(&g).is_err());
    }
} // end of mod tests

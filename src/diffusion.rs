//! Diffusion of the reaction core influence over a graph.
//!
//! We build $H = \beta (A - D)$ where $A$ is the adjacency matrix and $D$ the diagonal degree matrix,
//! and compute the heat kernel $E = \exp(H)$. $E_{ij}$ measures the influence of atom $i$ on atom $j$.
//!
//! The exponential is computed by the scaling and squaring method with Padé approximants of degree 3, 5, 7, 9 or 13
//! chosen according to the 1-norm of $H$ (Higham, The scaling and squaring method for the matrix exponential revisited, 2005).

use anyhow::anyhow;
use nalgebra::DMatrix;

use crate::graph::model::MolGraph;

// 1-norm bounds up to which each Padé degree is accurate enough
const THETA: [f64; 5] = [
    1.495585217958292e-2,
    2.539398330063230e-1,
    9.504178996162932e-1,
    2.097847961257068e0,
    5.371920351148152e0,
];

const PADE_DEGREES: [usize; 5] = [3, 5, 7, 9, 13];

const PADE3: [f64; 4] = [120., 60., 12., 1.];
const PADE5: [f64; 6] = [30240., 15120., 3360., 420., 30., 1.];
const PADE7: [f64; 8] = [17297280., 8648640., 1995840., 277200., 25200., 1512., 56., 1.];
const PADE9: [f64; 10] = [
    17643225600.,
    8821612800.,
    2075673600.,
    302702400.,
    30270240.,
    2162160.,
    110880.,
    3960.,
    90.,
    1.,
];
const PADE13: [f64; 14] = [
    64764752532480000.,
    32382376266240000.,
    7771770303897600.,
    1187353796428800.,
    129060195264000.,
    10559470521600.,
    670442572800.,
    33522128640.,
    1323241920.,
    40840800.,
    960960.,
    16380.,
    182.,
    1.,
];

/// The heat kernel of a graph.
#[cfg_attr(doc, katexit::katexit)]
pub struct Diffusion {
    beta : f64,
    operator : DMatrix<f64>,
}

impl Diffusion {
    /// computes $\exp(\beta (A - D))$ for the graph. The graph must have at least one atom.
    pub fn new(graph: &MolGraph, beta: f64) -> anyhow::Result<Self> {
        let n = graph.nb_atoms();
        if n == 0 {
            return Err(anyhow!("diffusion operator requested on graph {} with no atom", graph.get_name()));
        }
        let mut h = DMatrix::<f64>::zeros(n, n);
        for e in graph.get_graph().raw_edges() {
            let (i, j) = (e.source().index(), e.target().index());
            h[(i, j)] += beta;
            h[(j, i)] += beta;
            h[(i, i)] -= beta;
            h[(j, j)] -= beta;
        }
        let operator = expm(&h)?;
        if operator.iter().any(|x| !x.is_finite()) {
            return Err(anyhow!(
                "diffusion operator of graph {} has non finite entries, beta {:.3e}",
                graph.get_name(),
                beta
            ));
        }
        log::trace!("diffusion operator computed for graph {}, beta {:.3e}", graph.get_index(), beta);
        Ok(Diffusion { beta, operator })
    }

    /// influence of atom i on atom j
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.operator[(i, j)]
    }

    pub fn get_beta(&self) -> f64 {
        self.beta
    }

    pub fn get_operator(&self) -> &DMatrix<f64> {
        &self.operator
    }
} // end of impl Diffusion

/// maximum absolute column sum
fn norm1(a: &DMatrix<f64>) -> f64 {
    a.column_iter()
        .map(|c| c.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0., f64::max)
}

/// Matrix exponential by scaling and squaring.
#[cfg_attr(doc, katexit::katexit)]
pub fn expm(a: &DMatrix<f64>) -> anyhow::Result<DMatrix<f64>> {
    if !a.is_square() {
        return Err(anyhow!("expm : matrix not square, shape {:?}", a.shape()));
    }
    if a.iter().any(|x| !x.is_finite()) {
        return Err(anyhow!("expm : matrix has non finite entries"));
    }
    let norm = norm1(a);
    for (k, theta) in THETA.iter().enumerate().take(4) {
        if norm <= *theta {
            return pade(a, PADE_DEGREES[k]);
        }
    }
    // scale so that norm / 2^s <= theta13, then square s times
    let mut s = 0;
    if norm > THETA[4] {
        s = (norm / THETA[4]).log2().ceil() as i32;
    }
    let scaled = a * 2f64.powi(-s);
    let mut e = pade(&scaled, 13)?;
    for _ in 0..s {
        e = &e * &e;
    }
    Ok(e)
} // end of expm

// Padé approximant of degree m : solves (V - U) F = (V + U)
fn pade(a: &DMatrix<f64>, m: usize) -> anyhow::Result<DMatrix<f64>> {
    let n = a.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    let a2 = a * a;
    let (u, v) = if m == 13 {
        let c = &PADE13;
        let a4 = &a2 * &a2;
        let a6 = &a4 * &a2;
        let inner_u = &a6 * c[13] + &a4 * c[11] + &a2 * c[9];
        let u = a * (&a6 * inner_u + &a6 * c[7] + &a4 * c[5] + &a2 * c[3] + &identity * c[1]);
        let inner_v = &a6 * c[12] + &a4 * c[10] + &a2 * c[8];
        let v = &a6 * inner_v + &a6 * c[6] + &a4 * c[4] + &a2 * c[2] + &identity * c[0];
        (u, v)
    } else {
        let c: &[f64] = match m {
            3 => &PADE3,
            5 => &PADE5,
            7 => &PADE7,
            9 => &PADE9,
            _ => return Err(anyhow!("no Padé approximant of degree {}", m)),
        };
        // powers of a2 : a2^0 .. a2^(m/2)
        let mut powers = vec![identity.clone()];
        for k in 1..=(m / 2) {
            let next = &powers[k - 1] * &a2;
            powers.push(next);
        }
        let mut u = DMatrix::<f64>::zeros(n, n);
        let mut v = DMatrix::<f64>::zeros(n, n);
        for k in 0..=(m / 2) {
            u += &powers[k] * c[2 * k + 1];
            v += &powers[k] * c[2 * k];
        }
        (a * u, v)
    };
    let lhs = &v - &u;
    let rhs = &v + &u;
    lhs.lu()
        .solve(&rhs)
        .ok_or_else(|| anyhow!("expm : singular denominator in Padé approximant of degree {}", m))
} // end of pade

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn max_diff(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
        (a - b).iter().map(|x| x.abs()).fold(0., f64::max)
    }

    #[test]
    fn exp_of_diagonal() {
        log_init_test();
        //
        // norms chosen to go through all degrees and the squaring branch
        for x in [0.01, 0.2, 0.9, 2.0, 5.0, 40.0] {
            let a = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![x, -x, 0.5 * x]));
            let e = expm(&a).unwrap();
            for (i, y) in [x, -x, 0.5 * x].iter().enumerate() {
                let expected = y.exp();
                assert!((e[(i, i)] - expected).abs() <= 1.0e-10 * expected.max(1.));
            }
            assert!(e[(0, 1)].abs() < 1.0e-12);
        }
    }

    #[test]
    fn exp_of_rotation_generator() {
        log_init_test();
        //
        // exp([[0, t], [-t, 0]]) is the rotation of angle t
        for t in [0.1, 1.0, 3.0, 12.0] {
            let a = DMatrix::from_row_slice(2, 2, &[0., t, -t, 0.]);
            let e = expm(&a).unwrap();
            let expected = DMatrix::from_row_slice(2, 2, &[t.cos(), t.sin(), -t.sin(), t.cos()]);
            assert!(max_diff(&e, &expected) < 1.0e-9);
        }
    }

    #[test]
    fn heat_kernel_is_stochastic() {
        log_init_test();
        //
        // A - D has zero row sums, so exp(beta (A - D)) has unit row sums and is symmetric
        let g = reaction_like();
        for beta in [0.1, 1.0, 4.0] {
            let diffusion = Diffusion::new(&g, beta).unwrap();
            let e = diffusion.get_operator();
            for i in 0..g.nb_atoms() {
                let row_sum: f64 = e.row(i).iter().sum();
                assert!((row_sum - 1.).abs() < 1.0e-9);
                for j in 0..g.nb_atoms() {
                    assert!((diffusion.value(i, j) - diffusion.value(j, i)).abs() < 1.0e-9);
                    assert!(diffusion.value(i, j) >= -1.0e-12);
                }
            }
        }
    }

    #[test]
    fn huge_beta_is_an_error() {
        log_init_test();
        //
        let g = chain(&["C", "O", "N"], 1);
        assert!(Diffusion::new(&g, f64::MAX).is_err());
        let a = DMatrix::from_row_slice(2, 2, &[f64::NEG_INFINITY, 0., 0., 1.]);
        assert!(expm(&a).is_err());
        // large but representable decays still give a finite stochastic operator
        let diffusion = Diffusion::new(&g, 1.0e6).unwrap();
        for i in 0..3 {
            let row_sum: f64 = diffusion.get_operator().row(i).iter().sum();
            assert!(diffusion.get_operator().row(i).iter().all(|x| x.is_finite()));
            assert!((row_sum - 1.).abs() < 1.0e-6);
        }
    }

    #[test]
    fn empty_graph_is_an_error() {
        log_init_test();
        let g = from_edges(&[], &[]);
        assert!(Diffusion::new(&g, 1.).is_err());
    }
} // end of mod tests

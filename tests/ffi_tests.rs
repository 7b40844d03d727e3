//! Integration tests for the exported C interface
//!
//! Every entry point is called the way a host process would: through raw pointers to
//! caller-owned buffers, checking status codes and sentinel return values.

use std::ffi::CString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use approx::assert_relative_eq;
use hostfuncs::config::LOG_DIR_ENV;
use hostfuncs::ffi::{
    do_nothing, fun, fun_nostruct, fun_nostruct_alt, hostfuncs_get_print_level,
    hostfuncs_log_create, hostfuncs_log_write, hostfuncs_set_print_level, jacobian,
    matmul_nalgebra, matmul_ndarray, optimize, optimize_constrained, par_lookup_double,
    par_lookup_int, solve_lu, solve_nalgebra, solve_sparse,
};
use hostfuncs::host::{JacobianPar, ParStruct, SolStruct};
use hostfuncs::{
    HOSTFUNCS_INVALID_ARGUMENT, HOSTFUNCS_IO_ERROR, HOSTFUNCS_NULL_POINTER, HOSTFUNCS_SUCCESS,
    HOSTFUNCS_UNKNOWN_FIELD,
};

// ============================================================================
// Helper Functions
// ============================================================================

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_file(name: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "hostfuncs-ffi-{}-{}-{}.log",
        name,
        std::process::id(),
        n
    ))
}

/// Directory the example logs of this test binary go to.
fn example_log_dir() -> &'static PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("hostfuncs-ffi-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::env::set_var(LOG_DIR_ENV, &dir);
        dir
    })
}

fn c_path(path: &PathBuf) -> CString {
    CString::new(path.to_str().unwrap()).unwrap()
}

/// A `ParStruct` together with the buffers it points into.
struct HostPar {
    x: Vec<f64>,
    z: Vec<i32>,
    txt: CString,
    txtlist: CString,
}

impl HostPar {
    fn new(n: usize, txt: &str, txtlist: &str) -> Self {
        Self {
            x: (1..=n).map(|i| i as f64).collect(),
            z: vec![1; n],
            txt: CString::new(txt).unwrap(),
            txtlist: CString::new(txtlist).unwrap(),
        }
    }

    fn par(&mut self, threads: i32) -> ParStruct {
        ParStruct {
            threads,
            N: self.x.len() as i32,
            a: 2.0,
            b: 3.0,
            X: self.x.as_mut_ptr(),
            Z: self.z.as_mut_ptr(),
            txt: self.txt.as_ptr(),
            txtlist: self.txtlist.as_ptr(),
        }
    }
}

fn without_worker_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .filter(|line| !line.starts_with("omp_get_thread_num() = "))
        .collect()
}

// ============================================================================
// Log files
// ============================================================================

#[test]
fn test_log_create_and_write() {
    let path = temp_file("log");
    let c_target = c_path(&path);
    let first = CString::new("first line\n").unwrap();
    let second = CString::new("100% verbatim %d\n").unwrap();

    unsafe {
        assert_eq!(hostfuncs_log_write(c_target.as_ptr(), 0, first.as_ptr()), HOSTFUNCS_SUCCESS);
        assert_eq!(hostfuncs_log_create(c_target.as_ptr()), HOSTFUNCS_SUCCESS);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        assert_eq!(hostfuncs_log_write(c_target.as_ptr(), 0, first.as_ptr()), HOSTFUNCS_SUCCESS);
        assert_eq!(hostfuncs_log_write(c_target.as_ptr(), 0, second.as_ptr()), HOSTFUNCS_SUCCESS);
    }
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "first line\n100% verbatim %d\n"
    );
}

#[test]
fn test_log_errors() {
    let text = CString::new("x").unwrap();
    let missing = c_path(&std::env::temp_dir().join("hostfuncs-no-such-dir/sub/file.log"));
    unsafe {
        assert_eq!(hostfuncs_log_create(std::ptr::null()), HOSTFUNCS_NULL_POINTER);
        assert_eq!(
            hostfuncs_log_write(missing.as_ptr(), 0, std::ptr::null()),
            HOSTFUNCS_NULL_POINTER
        );
        assert_eq!(hostfuncs_log_create(missing.as_ptr()), HOSTFUNCS_IO_ERROR);
        assert_eq!(
            hostfuncs_log_write(missing.as_ptr(), 0, text.as_ptr()),
            HOSTFUNCS_IO_ERROR
        );
    }
}

#[test]
fn test_print_level_gate() {
    let path = temp_file("level");
    let c_target = c_path(&path);
    let kept = CString::new("kept\n").unwrap();
    let dropped = CString::new("dropped\n").unwrap();

    let previous = hostfuncs_get_print_level();
    // other tests only write at level 0, which stays enabled
    hostfuncs_set_print_level(1);
    assert_eq!(hostfuncs_get_print_level(), 1);
    unsafe {
        assert_eq!(hostfuncs_log_create(c_target.as_ptr()), HOSTFUNCS_SUCCESS);
        assert_eq!(hostfuncs_log_write(c_target.as_ptr(), 1, kept.as_ptr()), HOSTFUNCS_SUCCESS);
        assert_eq!(
            hostfuncs_log_write(c_target.as_ptr(), 2, dropped.as_ptr()),
            HOSTFUNCS_SUCCESS
        );
    }
    hostfuncs_set_print_level(previous);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
}

// ============================================================================
// Parameter lookup
// ============================================================================

#[test]
fn test_par_lookup() {
    let mut host = HostPar::new(3, "a", "threads|N");
    let par = host.par(4);
    let a = CString::new("a").unwrap();
    let n = CString::new("N").unwrap();
    let unknown = CString::new("zzz").unwrap();

    unsafe {
        let mut value = f64::NAN;
        assert_eq!(par_lookup_double(&par, a.as_ptr(), &mut value), HOSTFUNCS_SUCCESS);
        assert_eq!(value, 2.0);
        assert_eq!(par_lookup_double(&par, n.as_ptr(), &mut value), HOSTFUNCS_SUCCESS);
        assert_eq!(value, 3.0);

        let mut int_value = -1;
        assert_eq!(par_lookup_int(&par, n.as_ptr(), &mut int_value), HOSTFUNCS_SUCCESS);
        assert_eq!(int_value, 3);
        assert_eq!(
            par_lookup_int(&par, a.as_ptr(), &mut int_value),
            HOSTFUNCS_INVALID_ARGUMENT
        );

        assert_eq!(
            par_lookup_double(&par, unknown.as_ptr(), &mut value),
            HOSTFUNCS_UNKNOWN_FIELD
        );
        assert_eq!(
            par_lookup_double(std::ptr::null(), a.as_ptr(), &mut value),
            HOSTFUNCS_NULL_POINTER
        );
        assert_eq!(
            par_lookup_double(&par, a.as_ptr(), std::ptr::null_mut()),
            HOSTFUNCS_NULL_POINTER
        );
    }
}

// ============================================================================
// Parallel loops
// ============================================================================

#[test]
fn test_fun_and_fun_nostruct() {
    let log = example_log_dir().join("example.log");

    let mut host = HostPar::new(4, "a", "threads|N");
    let par = host.par(2);
    let mut y = vec![0.0; 4];
    let mut sol = SolStruct { Y: y.as_mut_ptr() };
    unsafe { fun(&par, &mut sol) };
    assert_eq!(y, vec![5.0, 10.0, 15.0, 20.0]);

    let content = std::fs::read_to_string(&log).unwrap();
    let workers = content
        .lines()
        .filter(|l| l.starts_with("omp_get_thread_num() = "))
        .count();
    assert_eq!(workers, 2);
    assert_eq!(
        without_worker_lines(&content),
        vec![
            "fun(...)",
            "",
            "",
            "string-value: a",
            "looked up value par->a = 2",
            "is \"a\" in \"threads|N\": true",
            "looked up value par->threads = 2",
            "looked up value par->N = 4",
            "",
            "sizeof(par->N) = 4",
        ]
    );

    // appends to the log written by `fun`
    let x = [1.0, 2.0];
    let z = [2, 3];
    let mut y = [0.0; 2];
    let txt = CString::new("b").unwrap();
    unsafe {
        fun_nostruct(x.as_ptr(), y.as_mut_ptr(), z.as_ptr(), 2, 1.0, 1.0, 1, txt.as_ptr());
    }
    assert_eq!(y, [4.0, 12.0]);

    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.starts_with("fun(...)\n"));
    assert!(content.contains("fun_nostruct(...)\n"));
    assert!(content.ends_with("\nstring-value: b\ntest was not succesfull\n\n"));

    // a failure is recorded instead of aborting the host
    let mut y = [0.0; 2];
    unsafe {
        fun_nostruct(std::ptr::null(), y.as_mut_ptr(), z.as_ptr(), 2, 1.0, 1.0, 1, txt.as_ptr());
    }
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.ends_with("fun_nostruct failed: null pointer for `X`\n"));
    assert_eq!(y, [0.0; 2]);
}

#[test]
fn test_fun_nostruct_alt_and_do_nothing() {
    let x = [1.0, 2.0, 3.0];
    let mut y = [0.0; 3];
    unsafe { fun_nostruct_alt(x.as_ptr(), y.as_mut_ptr(), 3, 1.0, 2.0, 2, std::ptr::null()) };
    assert_eq!(y, [3.0, 6.0, 9.0]);
    assert_eq!(do_nothing(), 5.0);
}

// ============================================================================
// Linear algebra
// ============================================================================

#[test]
fn test_matmul_backends() {
    // two 2x3 * 3x2 products
    let a = [
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0, //
        1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
    ];
    let b = [
        7.0, 8.0, 9.0, 10.0, 11.0, 12.0, //
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0,
    ];
    let expected = [58.0, 64.0, 139.0, 154.0, 1.0, 2.0, 3.0, 4.0];

    for matmul in [matmul_ndarray, matmul_nalgebra] {
        let mut c = [1.0; 8];
        let secs = unsafe {
            matmul(2, 2, 2, 3, 1.0, 0.0, a.as_ptr(), b.as_ptr(), c.as_mut_ptr(), 1, 2)
        };
        assert!(secs >= 0.0);
        assert_relative_eq!(&c[..], &expected[..], epsilon = 1e-12);
    }
}

#[test]
fn test_matmul_invalid_arguments() {
    let a = [1.0; 4];
    let mut c = [0.0; 4];
    let (a_ptr, c_ptr) = (a.as_ptr(), c.as_mut_ptr());
    let null = std::ptr::null();
    unsafe {
        assert!(matmul_ndarray(1, 2, 2, 2, 1.0, 0.0, a_ptr, null, c_ptr, 1, 1).is_nan());
        assert!(matmul_nalgebra(-1, 2, 2, 2, 1.0, 0.0, a_ptr, a_ptr, c_ptr, 1, 1).is_nan());
        // an empty batch never touches the buffers
        let secs = matmul_nalgebra(0, 2, 2, 2, 1.0, 0.0, null, null, std::ptr::null_mut(), 1, 1);
        assert!(secs >= 0.0);
    }
}

#[test]
fn test_dense_solvers() {
    // A = [[4, 3], [6, 3]], b = [10, 12] gives x = [1, 2]
    for solve in [solve_lu, solve_nalgebra] {
        let mut a = [4.0, 3.0, 6.0, 3.0, 2.0, 0.0, 0.0, 2.0];
        let mut b = [10.0, 12.0, 4.0, 6.0];
        let secs = unsafe { solve(2, 2, 1, a.as_mut_ptr(), b.as_mut_ptr(), 1, 2) };
        assert!(secs >= 0.0);
        assert_relative_eq!(&b[..], &[1.0, 2.0, 2.0, 3.0][..], epsilon = 1e-12);
    }
}

#[test]
fn test_dense_solver_singular() {
    let mut a = [1.0, 2.0, 2.0, 4.0];
    let mut b = [1.0, 1.0];
    let secs = unsafe { solve_lu(1, 2, 1, a.as_mut_ptr(), b.as_mut_ptr(), 1, 1) };
    assert!(secs.is_nan());
    assert_eq!(b, [1.0, 1.0]);
}

#[test]
fn test_sparse_solver() {
    // [[2, 0], [1, 4]] x = [2, 9] gives x = [1, 2], stored twice
    let indptr = [0, 1, 3, 0, 1, 3];
    let indices = [0, 0, 1, 0, 0, 1];
    let data = [2.0, 1.0, 4.0, 2.0, 1.0, 4.0];
    let b = [2.0, 9.0, 4.0, 18.0];
    let mut x = [0.0; 4];

    let secs = unsafe {
        solve_sparse(
            2,
            2,
            2,
            3,
            indptr.as_ptr(),
            indices.as_ptr(),
            data.as_ptr(),
            b.as_ptr(),
            x.as_mut_ptr(),
            1,
            2,
        )
    };
    assert!(secs >= 0.0);
    assert_relative_eq!(&x[..], &[1.0, 2.0, 2.0, 4.0][..], epsilon = 1e-12);

    // non-square systems are rejected
    let secs = unsafe {
        solve_sparse(
            1,
            2,
            3,
            3,
            indptr.as_ptr(),
            indices.as_ptr(),
            data.as_ptr(),
            b.as_ptr(),
            x.as_mut_ptr(),
            1,
            1,
        )
    };
    assert!(secs.is_nan());
}

// ============================================================================
// Optimisation
// ============================================================================

#[test]
fn test_optimize_constrained() {
    let mut x = [0.0; 2];
    let mut minf = 0.0;
    let mut evals = 0;
    let status = unsafe {
        optimize_constrained(0.6, 0.35, 0.5, 10, x.as_mut_ptr(), &mut minf, &mut evals)
    };
    assert_eq!(status, HOSTFUNCS_SUCCESS);
    assert!((x[0] - 0.225).abs() < 1e-3);
    assert!((x[1] - 0.375).abs() < 1e-3);
    assert!((minf - 0.03125).abs() < 1e-4);
    assert!(evals > 0);

    let status = unsafe {
        optimize_constrained(-1.0, 0.35, 0.5, 1, x.as_mut_ptr(), &mut minf, &mut evals)
    };
    assert_eq!(status, HOSTFUNCS_INVALID_ARGUMENT);
    let status = unsafe {
        optimize_constrained(0.6, 0.35, 0.5, 1, x.as_mut_ptr(), std::ptr::null_mut(), &mut evals)
    };
    assert_eq!(status, HOSTFUNCS_NULL_POINTER);
}

#[test]
fn test_optimize_writes_log() {
    let log = example_log_dir().join("example_NLopt.log");
    optimize();

    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("found minimum at f(0.22"));
    assert!(lines[1].starts_with("time: "));
}

// ============================================================================
// Jacobian
// ============================================================================

fn jacobian_par(x: &mut [f64], y: &mut [f64], jx: &mut [f64], ny: i32) -> JacobianPar {
    JacobianPar {
        Nx: x.len() as i32,
        Ny: ny,
        alpha: 2.0,
        beta: 3.0,
        x: x.as_mut_ptr(),
        y: y.as_mut_ptr(),
        Jx: jx.as_mut_ptr(),
    }
}

#[test]
fn test_jacobian() {
    let mut x = [1.0, 2.0, 0.0, 5.0];
    let mut y = [0.0; 2];
    let mut jx = [0.0; 8];
    let par = jacobian_par(&mut x, &mut y, &mut jx, 2);

    assert_eq!(unsafe { jacobian(&par) }, HOSTFUNCS_SUCCESS);
    assert_relative_eq!(&y[..], &[3.0, 6.0][..], epsilon = 1e-12);
    assert_relative_eq!(
        &jx[..],
        &[2.0, 0.0, 1.0, 0.0, 0.0, 3.0, 0.0, 0.0][..],
        epsilon = 1e-12
    );
}

#[test]
fn test_jacobian_invalid() {
    let mut x = [1.0, 2.0];
    let mut y = [0.0; 2];
    let mut jx = [0.0; 4];
    let par = jacobian_par(&mut x, &mut y, &mut jx, 2);
    assert_eq!(unsafe { jacobian(&par) }, HOSTFUNCS_INVALID_ARGUMENT);

    let mut x = [1.0, 2.0, 3.0];
    let mut jx = [0.0; 3];
    let par = jacobian_par(&mut x, &mut y, &mut jx, 1);
    assert_eq!(unsafe { jacobian(&par) }, HOSTFUNCS_INVALID_ARGUMENT);

    assert_eq!(unsafe { jacobian(std::ptr::null()) }, HOSTFUNCS_NULL_POINTER);
}

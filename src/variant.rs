//! Kernel invocation variants
//!
//! Five parallelization strategies share one runner. Each variant knows how
//! to turn (executable, problem size) into a full command line, so argv
//! construction lives in exactly one place.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Parallelization strategy family, without a concrete worker count
///
/// Used by configuration and CLI parsing; the scheduler instantiates it
/// into a [`KernelVariant`] per sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    /// Single-threaded baseline
    Sequential,
    /// POSIX-thread kernel
    Threaded,
    /// fork/worker-process kernel
    Process,
    /// OpenMP kernel
    OpenMp,
    /// MPI-style kernel started through a process launcher
    Distributed,
}

impl VariantKind {
    /// Parse from a CLI or log token
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Some(Self::Sequential),
            "threaded" | "threads" => Some(Self::Threaded),
            "process" | "processes" => Some(Self::Process),
            "openmp" | "omp" => Some(Self::OpenMp),
            "distributed" | "mpi" => Some(Self::Distributed),
            _ => None,
        }
    }

    /// Stable label used in log rows and file names
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Threaded => "threaded",
            Self::Process => "process",
            Self::OpenMp => "openmp",
            Self::Distributed => "distributed",
        }
    }

    /// Whether this family sweeps over a worker count
    #[must_use]
    pub const fn takes_workers(&self) -> bool {
        !matches!(self, Self::Sequential)
    }

    /// Bind a worker count (and hosts, for distributed) to this family
    #[must_use]
    pub fn instantiate(self, workers: Option<usize>, hosts: &[String]) -> KernelVariant {
        match self {
            Self::Sequential => KernelVariant::Sequential,
            Self::Threaded => KernelVariant::Threaded {
                workers: workers.unwrap_or(1),
            },
            Self::Process => KernelVariant::Process {
                workers: workers.unwrap_or(1),
            },
            Self::OpenMp => KernelVariant::OpenMp {
                workers: workers.unwrap_or(1),
            },
            Self::Distributed => KernelVariant::Distributed {
                workers: workers.unwrap_or(1),
                hosts: hosts.to_vec(),
            },
        }
    }

    /// All families, in the fixed sweep order
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Sequential,
            Self::Threaded,
            Self::Process,
            Self::OpenMp,
            Self::Distributed,
        ]
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One concrete invocation shape: family plus worker count
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelVariant {
    /// `<exe> <size>`
    Sequential,
    /// `<exe> <size> <workers>`
    Threaded {
        /// Thread count passed to the kernel
        workers: usize,
    },
    /// `<exe> <size> <workers>`
    Process {
        /// Worker-process count passed to the kernel
        workers: usize,
    },
    /// `<exe> <size> <workers>`
    OpenMp {
        /// OpenMP thread count passed to the kernel
        workers: usize,
    },
    /// `<launcher> -n <workers> -host <hosts> -oversubscribe <exe> <size>`
    Distributed {
        /// Rank count passed to the launcher
        workers: usize,
        /// Host list handed to the launcher verbatim
        hosts: Vec<String>,
    },
}

impl KernelVariant {
    /// Family of this variant
    #[must_use]
    pub const fn kind(&self) -> VariantKind {
        match self {
            Self::Sequential => VariantKind::Sequential,
            Self::Threaded { .. } => VariantKind::Threaded,
            Self::Process { .. } => VariantKind::Process,
            Self::OpenMp { .. } => VariantKind::OpenMp,
            Self::Distributed { .. } => VariantKind::Distributed,
        }
    }

    /// Worker count, absent for the sequential baseline
    #[must_use]
    pub const fn workers(&self) -> Option<usize> {
        match self {
            Self::Sequential => None,
            Self::Threaded { workers }
            | Self::Process { workers }
            | Self::OpenMp { workers }
            | Self::Distributed { workers, .. } => Some(*workers),
        }
    }

    /// Build the full command line for one sweep point
    ///
    /// Returns the program to spawn and its argument list. Only the
    /// distributed variant uses `launcher`; the others spawn the kernel
    /// binary directly.
    #[must_use]
    pub fn build_command(&self, exe: &Path, size: usize, launcher: &str) -> (String, Vec<String>) {
        let exe_str = exe.display().to_string();
        match self {
            Self::Sequential => (exe_str, vec![size.to_string()]),
            Self::Threaded { workers } | Self::Process { workers } | Self::OpenMp { workers } => {
                (exe_str, vec![size.to_string(), workers.to_string()])
            }
            Self::Distributed { workers, hosts } => {
                let mut args = vec!["-n".to_string(), workers.to_string()];
                if !hosts.is_empty() {
                    args.push("-host".to_string());
                    args.push(hosts.join(","));
                }
                args.push("-oversubscribe".to_string());
                args.push(exe_str);
                args.push(size.to_string());
                (launcher.to_string(), args)
            }
        }
    }
}

impl std::fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.workers() {
            Some(w) => write!(f, "{} x{w}", self.kind().label()),
            None => write!(f, "{}", self.kind().label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!(VariantKind::parse("seq"), Some(VariantKind::Sequential));
        assert_eq!(VariantKind::parse("OpenMP"), Some(VariantKind::OpenMp));
        assert_eq!(VariantKind::parse("mpi"), Some(VariantKind::Distributed));
        assert_eq!(VariantKind::parse("cuda"), None);
    }

    #[test]
    fn test_label_round_trip() {
        for kind in VariantKind::all() {
            assert_eq!(VariantKind::parse(kind.label()), Some(kind));
        }
    }

    #[test]
    fn test_sequential_command_shape() {
        let exe = PathBuf::from("./bin/matmul_seq");
        let (program, args) = KernelVariant::Sequential.build_command(&exe, 911, "mpiexec");
        assert_eq!(program, "./bin/matmul_seq");
        assert_eq!(args, vec!["911"]);
    }

    #[test]
    fn test_worker_variants_command_shape() {
        let exe = PathBuf::from("./bin/matmul_omp");
        for variant in [
            KernelVariant::Threaded { workers: 8 },
            KernelVariant::Process { workers: 8 },
            KernelVariant::OpenMp { workers: 8 },
        ] {
            let (program, args) = variant.build_command(&exe, 1229, "mpiexec");
            assert_eq!(program, "./bin/matmul_omp");
            assert_eq!(args, vec!["1229", "8"]);
        }
    }

    #[test]
    fn test_distributed_command_shape() {
        let exe = PathBuf::from("./bin/matmul_mpi");
        let variant = KernelVariant::Distributed {
            workers: 4,
            hosts: vec!["wn1".to_string(), "wn2".to_string(), "wn3".to_string()],
        };
        let (program, args) = variant.build_command(&exe, 1658, "mpiexec");
        assert_eq!(program, "mpiexec");
        assert_eq!(
            args,
            vec![
                "-n",
                "4",
                "-host",
                "wn1,wn2,wn3",
                "-oversubscribe",
                "./bin/matmul_mpi",
                "1658"
            ]
        );
    }

    #[test]
    fn test_distributed_without_hosts_omits_flag() {
        let exe = PathBuf::from("./bin/matmul_mpi");
        let variant = KernelVariant::Distributed {
            workers: 2,
            hosts: vec![],
        };
        let (_, args) = variant.build_command(&exe, 100, "mpiexec");
        assert!(!args.contains(&"-host".to_string()));
        assert!(args.contains(&"-oversubscribe".to_string()));
    }

    #[test]
    fn test_workers_accessor() {
        assert_eq!(KernelVariant::Sequential.workers(), None);
        assert_eq!(KernelVariant::Threaded { workers: 12 }.workers(), Some(12));
    }

    #[test]
    fn test_instantiate_defaults() {
        let v = VariantKind::Threaded.instantiate(None, &[]);
        assert_eq!(v.workers(), Some(1));
        let v = VariantKind::Sequential.instantiate(Some(8), &[]);
        assert_eq!(v.workers(), None);
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::auth::Capability;

#[derive(Parser, Debug)]
#[command(name = "clinicdesk")]
#[command(version = "0.1.0")]
#[command(about = "Command-line front-end for the clinic management backend", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Backend base URL (overrides configuration)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from CLINICDESK_PASSWORD, or prompted on stdin when absent
        #[arg(long, env = "CLINICDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show configuration and session status
    Status,
    /// Follow session changes made by other processes until Ctrl-C
    Watch,
    /// List the records of a resource
    List {
        #[arg(value_enum)]
        resource: Resource,
    },
    /// Show one record
    Show {
        #[arg(value_enum)]
        resource: Resource,
        id: String,
    },
    /// Delete one record
    Delete {
        #[arg(value_enum)]
        resource: Resource,
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    Patients,
    Doctors,
    Clinics,
    Specialties,
    Users,
    Appointments,
    Records,
}

impl Resource {
    /// Capability needed to read this resource
    pub fn read_capability(&self) -> Capability {
        match self {
            Resource::Patients => Capability::ManagePatients,
            Resource::Doctors => Capability::ManageDoctors,
            Resource::Clinics => Capability::ManageClinics,
            Resource::Specialties => Capability::ManageSpecialties,
            Resource::Users => Capability::ManageUsers,
            Resource::Appointments => Capability::ViewAppointments,
            Resource::Records => Capability::ViewMedicalRecords,
        }
    }

    /// Capability needed to change this resource
    pub fn write_capability(&self) -> Capability {
        match self {
            Resource::Appointments => Capability::EditAppointments,
            other => other.read_capability(),
        }
    }
}

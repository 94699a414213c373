use std::fmt::Display;

#[derive(Debug)]
pub enum WeldSimError {
    Config(String),
    Solver(String),
    PostProcessor(String),
}

impl Display for WeldSimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (err_name, value) = match self {
            WeldSimError::Config(v) => ("Config", v),
            WeldSimError::Solver(v) => ("Solver", v),
            WeldSimError::PostProcessor(v) => ("Post Processor", v),
        };

        write!(f, "{} error: {}", err_name, value)
    }
}

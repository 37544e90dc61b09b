use std::fmt;

/// A fully resolved instruction for the process runner.
///
/// `ShellPipeline` is only for templates that chain several programs;
/// stdin and stdout redirection never need a shell. Every stage is quoted
/// word by word when rendered, so target strings never reach the shell
/// unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ArgVector { program: String, args: Vec<String> },
    ShellPipeline { stages: Vec<Vec<String>> },
}

impl Command {
    /// Every program that has to resolve on the search path before spawning.
    pub fn programs(&self) -> Vec<&str> {
        match self {
            Command::ArgVector { program, .. } => vec![program.as_str()],
            Command::ShellPipeline { stages } => {
                let mut programs: Vec<&str> = Vec::new();
                for program in stages.iter().filter_map(|s| s.first()) {
                    if !programs.contains(&program.as_str()) {
                        programs.push(program);
                    }
                }
                programs
            }
        }
    }

    /// Shell script form of a pipeline: stages quoted and joined with `|`.
    pub fn script(&self) -> String {
        match self {
            Command::ArgVector { program, args } => {
                let mut words = Vec::with_capacity(args.len() + 1);
                words.push(program.as_str());
                words.extend(args.iter().map(String::as_str));
                shell_words::join(words)
            }
            Command::ShellPipeline { stages } => stages
                .iter()
                .map(shell_words::join)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.script())
    }
}

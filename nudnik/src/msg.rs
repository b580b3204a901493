use color_print::cprintln;

#[derive(Debug)]
pub enum Msg {
    Error(String),
    Warn(String),
    Note(String),
}

impl Msg {
    pub fn print(&self, file: &str) {
        self.print_in(file, None);
    }

    /// Like [`Msg::print`], pointing at a process of `file`.
    pub fn print_in(&self, file: &str, process: Option<&str>) {
        match self {
            Msg::Error(msg) => cprintln!("<red,bold>error</>: {}", msg),
            Msg::Warn(msg) => cprintln!("<yellow,bold>warn</>: {}", msg),
            Msg::Note(msg) => cprintln!("<green,bold>note</>: {}", msg),
        }
        match process {
            Some(name) => cprintln!("     <blue>--></> <underline>{}</> in <b>{}</>", file, name),
            None => cprintln!("     <blue>--></> <underline>{}</>", file),
        }
    }
}

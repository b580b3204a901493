use color_print::{cformat, cprintln};

use crate::program::{Program, DATA, TEXT};

/// Print a colored listing of `program`.
pub fn print_dump(program: &Program) {
    let header = |name: &str| {
        cprintln!(
            "{}+------[<s>{}</>]{}",
            "-".repeat(19),
            name,
            "-".repeat(45usize.saturating_sub(name.len()))
        )
    };

    for line in &program.segmentless {
        println!("{:19}| {}", "", line);
    }
    for (name, lines) in &program.misc {
        header(name);
        for line in lines {
            println!("{:19}| {}", "", line);
        }
    }
    if let Some(data) = &program.data {
        header(DATA);
        for line in data {
            println!("{:19}| {}", "", line);
        }
    }

    for (idx, seg) in program.texts.iter().enumerate() {
        header(&format!("{TEXT}#{idx}"));
        for (name, value) in &seg.data {
            let sym = cformat!("<c>{} = {}</>", name, value);
            println!("{:19}| {}", "", sym);
        }
        for (name, body) in &seg.processes {
            let proc = cformat!("<y,s>{} PROC</>", name);
            println!("{:19}| {}", "", proc);
            for (pc, inst) in body.iter().enumerate() {
                let pos = format!("[{:04}] {:>2} units", pc, inst.includes().len());
                println!("{:<19}| {}", pos, inst.cformat());
            }
        }
    }
    println!("-------------------+-----------------------------------------------------");
}

use crate::analysis::Analysis;
use crate::state_machine::Machine;

/// Validates the analysis, then writes solver input. Never touches the network.
pub(crate) fn run(machine: &Machine, mut analysis: Analysis) {
    machine.status("Checking analysis member...\n\n");

    check_single_body(machine, &analysis);
    check_material(machine, &analysis);
    check_fixed_constraint(machine, &analysis);
    clamp_error_threshold(machine, &mut analysis);

    if machine.failed() {
        return;
    }

    machine.status("Preparing solver input...\n\n");
    match machine.writer().write_input(&analysis, machine.directory()) {
        Ok(paths) => {
            let missing: Vec<_> = paths.iter().filter(|p| !p.exists()).collect();
            if paths.is_empty() {
                machine.error("Writing solver input failed: no file was written.\n");
                machine.fail();
            } else if !missing.is_empty() {
                for path in missing {
                    machine.error(format!("Expected input file is missing: {}\n", path.display()));
                }
                machine.fail();
            } else {
                machine.status("Writing solver input completed.\n");
            }
        }
        Err(e) => {
            machine.error(format!("Writing solver input failed: {e}\n"));
            machine.fail();
        }
    }
}

fn check_single_body(machine: &Machine, analysis: &Analysis) {
    match analysis.bodies.as_slice() {
        [] => {
            machine.error("Add one Body object.\n");
            machine.fail();
        }
        [body] => match body.solids {
            0 => {
                machine.error(format!("Add one 3D solid into body \"{}\".\n", body.label));
                machine.fail();
            }
            1 => {}
            _ => {
                machine.error("Only one 3D solid per Body object is supported for this solver (so far).\n");
                machine.fail();
            }
        },
        _ => {
            machine.error("Only one Body object is supported for this solver (so far).\n");
            machine.fail();
        }
    }
}

fn check_material(machine: &Machine, analysis: &Analysis) {
    match analysis.materials.as_slice() {
        [] => {
            machine.error("No material object defined in the analysis.\n");
            machine.fail();
        }
        [material] if !material.selected => {
            machine.error(format!("No material was selected for {}.\n", material.name));
            machine.fail();
        }
        [_] => {}
        _ => {
            machine.error("Only one material object is supported for this solver (so far).\n");
            machine.fail();
        }
    }
}

fn check_fixed_constraint(machine: &Machine, analysis: &Analysis) {
    if analysis.fixed_constraints.is_empty() {
        machine.error(
            "Missing a fixed boundary condition. At least one fixed boundary condition is required.\n",
        );
        machine.fail();
    }
}

// Below the floor the value is raised with a warning, not rejected.
fn clamp_error_threshold(machine: &Machine, analysis: &mut Analysis) {
    let floor = machine.options().min_error_threshold;
    // Written so that NaN is clamped too.
    if !(analysis.error_threshold >= floor) {
        analysis.error_threshold = floor;
        machine.warning(format!(
            "Due to limited compute resources at this stage, the minimum error threshold \
             (quality requirement) cannot be set below {floor}%.\n"
        ));
    }
}

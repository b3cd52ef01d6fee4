use bytes::Bytes;

use super::{Counters, Marking, NormalizationStep, Observation};
use crate::dictionary::FileSchema;
use crate::error::{NormalizationError, ValidatorError};

/// Column positions allele masking reads and rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskingColumns {
    pub reference_genome_allele: usize,
    pub mutated_from_allele: usize,
    pub mutated_to_allele: usize,
    pub control_genotype: usize,
    pub tumour_genotype: usize,
}

impl MaskingColumns {
    pub fn from_schema(schema: &FileSchema) -> Result<Self, ValidatorError> {
        Ok(Self {
            reference_genome_allele: schema.index_of("reference_genome_allele")?,
            mutated_from_allele: schema.index_of("mutated_from_allele")?,
            mutated_to_allele: schema.index_of("mutated_to_allele")?,
            control_genotype: schema.index_of("control_genotype")?,
            tumour_genotype: schema.index_of("tumour_genotype")?,
        })
    }
}

/// Classifies observations as OPEN or CONTROLLED and, unless only marking,
/// follows every CONTROLLED observation with a MASKED copy.
///
/// An observation is CONTROLLED when its mutated-from allele differs from the
/// reference genome: it then exposes the donor's germline genotype. The
/// masked copy clears both genotypes and sets the mutated-from allele to the
/// reference. No copy is made when it would be trivial, that is when the
/// mutated-to allele is the reference allele.
#[derive(Debug)]
pub struct AlleleMasking {
    columns: MaskingColumns,
    marking_only: bool,
}

impl AlleleMasking {
    pub fn new(columns: MaskingColumns, marking_only: bool) -> Self {
        Self {
            columns,
            marking_only,
        }
    }

    fn masked_copy(&self, observation: &Observation) -> Observation {
        let columns = self.columns;
        let mut fields = observation.fields.clone();
        let reference = observation.fields[columns.reference_genome_allele].clone();
        for index in [columns.control_genotype, columns.tumour_genotype] {
            fields[index] = Bytes::new();
        }
        fields[columns.mutated_from_allele] = reference;
        Observation {
            line: observation.line,
            fields,
            marking: Marking::Masked,
        }
    }

    /// Fields a row needs for every masking column to exist.
    fn needed(&self) -> usize {
        let columns = self.columns;
        [
            columns.reference_genome_allele,
            columns.mutated_from_allele,
            columns.mutated_to_allele,
            columns.control_genotype,
            columns.tumour_genotype,
        ]
        .into_iter()
        .max()
        .map_or(0, |index| index + 1)
    }
}

impl NormalizationStep for AlleleMasking {
    fn name(&self) -> &'static str {
        "allele_masking"
    }

    fn optional(&self) -> Option<&'static str> {
        Some("masking")
    }

    fn process(
        &mut self,
        mut observation: Observation,
        out: &mut Vec<Observation>,
        counters: &mut Counters,
    ) -> Result<(), NormalizationError> {
        if observation.marking != Marking::Open {
            return Err(NormalizationError::UnexpectedMarking {
                line: observation.line,
                marking: observation.marking,
            });
        }
        let needed = self.needed();
        if observation.fields.len() < needed {
            return Err(NormalizationError::MissingAlleleColumns {
                line: observation.line,
                len: observation.fields.len(),
                needed,
            });
        }

        let columns = self.columns;
        let reference = observation.field(columns.reference_genome_allele);
        if reference == observation.field(columns.mutated_from_allele) {
            out.push(observation);
            return Ok(());
        }

        observation.marking = Marking::Controlled;
        counters.marked_as_controlled += 1;

        let copy = (!self.marking_only
            && observation.field(columns.mutated_to_allele) != observation.field(columns.reference_genome_allele))
        .then(|| self.masked_copy(&observation));

        out.push(observation);
        if let Some(copy) = copy {
            counters.masked += 1;
            out.push(copy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::dictionary::Dictionary;
    use vouch_types::FileType;

    fn observation(reference: &str, from: &str, to: &str) -> Observation {
        let values = [
            "AN1", "SA1", "snv", "1", "10", "10", reference, "A/G", "G/T", from, to,
        ];
        Observation::new(
            2,
            values.iter().map(|v| Bytes::copy_from_slice(v.as_bytes())).collect(),
        )
    }

    fn step(marking_only: bool) -> AlleleMasking {
        let dictionary = Dictionary::builtin();
        let schema = dictionary.schema(FileType::SsmP).unwrap();
        AlleleMasking::new(MaskingColumns::from_schema(schema).unwrap(), marking_only)
    }

    fn run(step: &mut AlleleMasking, observation: Observation) -> (Vec<Observation>, Counters) {
        let mut out = Vec::new();
        let mut counters = Counters::default();
        step.process(observation, &mut out, &mut counters).unwrap();
        (out, counters)
    }

    #[test]
    fn reference_from_allele_stays_open() {
        let (out, counters) = run(&mut step(false), observation("A", "A", "T"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marking, Marking::Open);
        assert_eq!(counters.marked_as_controlled, 0);
    }

    #[test]
    fn trivial_mask_is_suppressed() {
        let (out, counters) = run(&mut step(false), observation("A", "G", "A"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marking, Marking::Controlled);
        assert_eq!(counters.masked, 0);
    }

    #[test]
    fn marking_only_never_copies() {
        let (out, counters) = run(&mut step(true), observation("A", "G", "T"));
        assert_eq!(out.len(), 1);
        assert_eq!(counters.marked_as_controlled, 1);
        assert_eq!(counters.masked, 0);
    }

    #[test]
    fn already_marked_input_is_a_defect() {
        let mut input = observation("A", "G", "T");
        input.marking = Marking::Masked;
        let result = step(false).process(input, &mut Vec::new(), &mut Counters::default());
        assert!(matches!(
            result,
            Err(NormalizationError::UnexpectedMarking { line: 2, marking: Marking::Masked })
        ));
    }

    #[test]
    fn short_row_is_a_defect() {
        let mut input = observation("A", "G", "T");
        input.fields.truncate(8);
        let mut out = Vec::new();
        let result = step(false).process(input, &mut out, &mut Counters::default());
        assert!(matches!(
            result,
            Err(NormalizationError::MissingAlleleColumns { line: 2, len: 8, needed: 11 })
        ));
        assert!(out.is_empty());
    }

    proptest! {
        #[test]
        fn controlled_rows_get_one_faithful_masked_copy(
            reference in "[ACGT]",
            from in "[ACGT]",
            to in "[ACGT]",
        ) {
            let mut masking = step(false);
            let (out, counters) = run(&mut masking, observation(&reference, &from, &to));

            if reference == from {
                prop_assert_eq!(out.len(), 1);
                prop_assert_eq!(out[0].marking, Marking::Open);
            } else if reference == to {
                prop_assert_eq!(out.len(), 1);
                prop_assert_eq!(out[0].marking, Marking::Controlled);
            } else {
                prop_assert_eq!(out.len(), 2);
                prop_assert_eq!(counters.masked, 1);
                let masked = &out[1];
                prop_assert_eq!(masked.marking, Marking::Masked);
                prop_assert_eq!(masked.field(9), reference.as_bytes());
                prop_assert_eq!(masked.field(7), b"".as_slice());
                prop_assert_eq!(masked.field(8), b"".as_slice());
                prop_assert_eq!(masked.field(10), to.as_bytes());
            }
        }
    }
}

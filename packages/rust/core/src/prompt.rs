//! Prompt assembly for document processing.
//!
//! The prompt has four labelled sections in a fixed order (background,
//! progress summary, template, input) followed by a fixed instruction.
//! Assembly is a pure function of its inputs.

/// Opening line: the model's task.
const PREAMBLE: &str = "你是一个专业的数据整理助手。请参照以下提供的模版格式、背景知识和项目进度摘要，对输入的信息进行整理和分析。";

const BACKGROUND_HEADER: &str = "【项目背景与术语】:";
const SUMMARY_HEADER: &str = "【进度摘要/上下文】:";
const TEMPLATE_HEADER: &str = "【模版格式】:";
const INPUT_HEADER: &str = "【输入信息】:";

/// Closing instruction: follow the template; mark or infer missing fields.
const INSTRUCTION: &str = "请严格按照模版的逻辑和结构输出整理后的内容。如果输入信息中缺少某些字段，请标注为“缺失”或根据上下文合理推断。";

/// The four text fields merged into a processing prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    pub background: &'a str,
    pub context_summary: &'a str,
    pub template: &'a str,
    pub content: &'a str,
}

/// Compose the processing prompt.
pub fn assemble_prompt(inputs: &PromptInputs<'_>) -> String {
    let sections = [
        (BACKGROUND_HEADER, inputs.background),
        (SUMMARY_HEADER, inputs.context_summary),
        (TEMPLATE_HEADER, inputs.template),
        (INPUT_HEADER, inputs.content),
    ];

    let capacity = PREAMBLE.len()
        + INSTRUCTION.len()
        + sections
            .iter()
            .map(|(h, body)| h.len() + body.len() + 3)
            .sum::<usize>()
        + 4;
    let mut prompt = String::with_capacity(capacity);

    prompt.push('\n');
    prompt.push_str(PREAMBLE);
    prompt.push('\n');
    for (header, body) in sections {
        prompt.push('\n');
        prompt.push_str(header);
        prompt.push('\n');
        prompt.push_str(body);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(INSTRUCTION);
    prompt.push('\n');
    prompt
}

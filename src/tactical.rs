//! The tactical-advice request: transcript, knobs, and output line

use std::io::Write;
use log::{debug, error, info};
use crate::client::TextGenerator;
use crate::request::{ChatMessage, GenerationOutput, GenerationParams};
use crate::tokenizer::Tokenizer;

pub const SYSTEM_PROMPT: &str
  = "You are a professional football tactical AI assistant who provides expert analysis and strategic advice!";
pub const USER_QUESTION: &str
  = "What tactical formation should I use?";

pub const MAX_NEW_TOKENS: usize = 100;
pub const TEMPERATURE: f32 = 0.7;
/// Llama 3 end-of-turn marker
pub const END_OF_TURN_TOKEN: &str = "<|eot_id|>";
pub const RESPONSE_MARKER: &str = "⚽";

/// System persona followed by the user question
pub fn build_transcript() -> Vec<ChatMessage>
{   vec![
      ChatMessage::system(SYSTEM_PROMPT)
    , ChatMessage::user(USER_QUESTION)
    ]
}

/// Fixed generation knobs; stop on end-of-sequence or end-of-turn
pub fn generation_params(tokenizer: &Tokenizer)
  -> Result<GenerationParams, crate::error::Error>
{   Ok(GenerationParams
    {   max_new_tokens: MAX_NEW_TOKENS
      , eos_token_id: vec![
          tokenizer.eos_token_id()
        , tokenizer.convert_tokens_to_ids(END_OF_TURN_TOKEN)?
        ]
      , temperature: TEMPERATURE
    })
}

/// Content of the last turn of the first result
pub fn extract_response(outputs: &[GenerationOutput])
  -> Result<&str, crate::error::Error>
{   outputs.first()
      .and_then(|o| o.generated_text.last())
      .map(|turn| turn.content.as_str())
      .ok_or_else(|| {
        error!("Generated output has no turns");
        crate::error::Error::NoGeneratedText
      })
}

pub fn format_response(text: &str) -> String
{   format!("{} {}", RESPONSE_MARKER, text)
}

/// Ask once and write the answer line to `out`
pub async fn run<G, W>(generator: &G, out: &mut W)
  -> Result<(), crate::error::Error>
where G: TextGenerator + ?Sized
    , W: Write
{   let messages = build_transcript();
    let params = generation_params(generator.tokenizer())?;
    debug!("Generation params: {:?}", params);

    let outputs = generator.generate(messages, params).await?;
    let response = extract_response(&outputs)?;
    info!("Received {} bytes of advice", response.len());

    writeln!(out, "{}", format_response(response)).map_err(|e| {
      error!("Failed to write response: {}", e);
      crate::error::Error::Io(e.to_string())
    })
}

#[cfg(test)]
mod tests
{   use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::request::Role;

    const LLAMA3_TOKENIZER: &str = r#"{
      "added_tokens_decoder": {
        "128001": {"content": "<|end_of_text|>"},
        "128009": {"content": "<|eot_id|>"}
      },
      "eos_token": "<|end_of_text|>"
    }"#;

    struct StubGenerator
    {   tokenizer: Tokenizer
      , reply: Result<Vec<GenerationOutput>, crate::error::Error>
      , calls: Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>
    }

    impl StubGenerator
    {   fn new(reply: Result<Vec<GenerationOutput>, crate::error::Error>)
          -> Self
        {   StubGenerator
            {   tokenizer: Tokenizer::from_config_json(LLAMA3_TOKENIZER)
                  .unwrap()
              , reply
              , calls: Mutex::new(vec![])
            }
        }

        fn answering(content: &str) -> Self
        {   let mut generated_text = build_transcript();
            generated_text.push(ChatMessage::assistant(content));
            Self::new(Ok(vec![GenerationOutput { generated_text }]))
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator
    {   fn tokenizer(&self) -> &Tokenizer
        {   &self.tokenizer
        }

        async fn generate(
          &self
        , messages: Vec<ChatMessage>
        , params: GenerationParams
        ) -> Result<Vec<GenerationOutput>, crate::error::Error>
        {   self.calls.lock().unwrap().push((messages, params));
            self.reply.clone()
        }
    }

    #[test]
    fn transcript_is_system_then_user()
    {   let transcript = build_transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[1].role, Role::User);
        assert!(transcript.iter().all(|t| !t.content.is_empty()));
    }

    #[test]
    fn params_carry_both_stop_tokens()
    {   let tokenizer = Tokenizer::from_config_json(LLAMA3_TOKENIZER)
          .unwrap();
        let params = generation_params(&tokenizer).unwrap();
        assert_eq!(params.max_new_tokens, 100);
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.eos_token_id, vec![128001, 128009]);
    }

    #[test]
    fn prints_the_marked_answer()
    {   let stub = StubGenerator::answering("4-3-3 with high press");
        let mut out = Vec::<u8>::new();
        tokio_test::block_on(run(&stub, &mut out)).unwrap();
        assert_eq!(
          String::from_utf8(out).unwrap(),
          "⚽ 4-3-3 with high press\n"
        );

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, build_transcript());
    }

    #[test]
    fn params_are_identical_across_runs()
    {   let stub = StubGenerator::answering("4-4-2");
        for _ in 0..2
        {   tokio_test::block_on(run(&stub, &mut Vec::<u8>::new())).unwrap();
        }
        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0].1, calls[1].1);
    }

    #[test]
    fn auth_failure_prints_nothing()
    {   let stub = StubGenerator::new(Err(
          crate::error::Error::Unauthorized("401".to_string())
        ));
        let mut out = Vec::<u8>::new();
        let result = tokio_test::block_on(run(&stub, &mut out));
        assert!(matches!(result, Err(crate::error::Error::Unauthorized(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn empty_output_is_an_error()
    {   let stub = StubGenerator::new(Ok(vec![]));
        let mut out = Vec::<u8>::new();
        let result = tokio_test::block_on(run(&stub, &mut out));
        assert_eq!(result, Err(crate::error::Error::NoGeneratedText));
        assert!(out.is_empty());
    }
}
